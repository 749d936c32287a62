#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn tddctx(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tddctx").unwrap();
    cmd.current_dir(dir.path())
        .env("TDDCTX_ROOT", dir.path())
        .env_remove("TDDCTX_STATE_DIR")
        .env_remove("TDDCTX_EVIDENCE_DIR");
    cmd
}

/// Project whose test command prints a Jest JSON report from `report.json`.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tddctx.yaml"),
        "tests:\n  command: cat report.json\n  timeout_seconds: 30\n",
    )
    .unwrap();
    dir
}

fn set_report(dir: &TempDir, passed: u64, failed: u64) {
    std::fs::write(
        dir.path().join("report.json"),
        format!(
            r#"{{"numTotalTests": {}, "numPassedTests": {passed}, "numFailedTests": {failed}}}"#,
            passed + failed
        ),
    )
    .unwrap();
}

fn context_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".trae/context/development_context.json")
}

fn context(dir: &TempDir) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(context_path(dir)).unwrap()).unwrap()
}

fn write_context(dir: &TempDir, value: serde_json::Value) {
    let path = context_path(dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

// ---------------------------------------------------------------------------
// tddctx update
// ---------------------------------------------------------------------------

#[test]
fn update_initialises_context_from_test_run() {
    let dir = project();
    set_report(&dir, 4, 1);
    tddctx(&dir)
        .arg("update")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved context to"));

    let ctx = context(&dir);
    assert_eq!(ctx["test_status"]["total_tests"], 5);
    assert_eq!(ctx["test_status"]["failing_tests"], 1);
    assert_eq!(ctx["test_status"]["coverage_percentage"], 80.0);
    assert_eq!(ctx["tdd_cycle"]["current_cycle"], "RED");
    assert_eq!(ctx["current_gate"], "G1");
}

#[test]
fn cycle_moves_red_green_refactor() {
    let dir = project();
    set_report(&dir, 2, 1);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();
    assert_eq!(context(&dir)["tdd_cycle"]["current_cycle"], "RED");

    set_report(&dir, 3, 0);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();
    assert_eq!(context(&dir)["tdd_cycle"]["current_cycle"], "GREEN");

    tddctx(&dir).args(["update", "--quiet"]).assert().success();
    let ctx = context(&dir);
    assert_eq!(ctx["tdd_cycle"]["current_cycle"], "REFACTOR");
    assert_eq!(ctx["tdd_cycle"]["cycles_completed"], 1);
}

#[test]
fn update_records_failed_test_command() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tddctx.yaml"),
        "tests:\n  command: \"echo boom >&2; exit 3\"\n",
    )
    .unwrap();
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    let ctx = context(&dir);
    assert_eq!(ctx["test_status"]["success"], false);
    assert!(ctx["test_status"]["last_error"]
        .as_str()
        .unwrap()
        .contains("exit code 3"));
}

#[test]
fn update_without_package_json_records_missing_manifest() {
    let dir = TempDir::new().unwrap();
    tddctx(&dir).args(["update", "--quiet"]).assert().success();
    assert_eq!(
        context(&dir)["test_status"]["last_error"],
        "No package.json found"
    );
}

#[test]
fn update_no_tests_skips_the_suite() {
    let dir = project();
    tddctx(&dir)
        .args(["update", "--no-tests", "--phase", "implementation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));

    let ctx = context(&dir);
    assert!(ctx["test_status"]["last_run"].is_null());
    assert_eq!(ctx["current_phase"], "implementation");
}

#[test]
fn update_refuses_to_skip_gates() {
    let dir = project();
    set_report(&dir, 1, 0);
    tddctx(&dir)
        .args(["update", "--gate", "G3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot skip from G1 to G3"));
    assert!(!context_path(&dir).exists());

    tddctx(&dir)
        .args(["update", "--gate", "G3", "--force", "--quiet"])
        .assert()
        .success();
    assert_eq!(context(&dir)["current_gate"], "G3");
}

#[test]
fn update_rejects_unknown_gate() {
    let dir = project();
    tddctx(&dir)
        .args(["update", "--gate", "G7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid gate 'G7'"));
}

#[test]
fn update_json_reports_path() {
    let dir = project();
    set_report(&dir, 1, 0);
    let out = tddctx(&dir)
        .args(["update", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(value["path"]
        .as_str()
        .unwrap()
        .ends_with("development_context.json"));
    assert_eq!(value["context"]["tdd_cycle"]["current_cycle"], "GREEN");
}

#[test]
fn update_preserves_unknown_keys() {
    let dir = project();
    set_report(&dir, 1, 0);
    write_context(
        &dir,
        serde_json::json!({
            "project_info": {"name": "legacy", "version": "2.0.0"},
            "custom_notes": ["keep me"],
            "test_status": {"total_tests": "7"},
        }),
    );
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    let ctx = context(&dir);
    assert_eq!(ctx["custom_notes"][0], "keep me");
    assert_eq!(ctx["project_info"]["name"], "legacy");
    assert_eq!(ctx["test_status"]["total_tests"], 1);
}

// ---------------------------------------------------------------------------
// tddctx check
// ---------------------------------------------------------------------------

#[test]
fn check_without_context_fails() {
    let dir = project();
    tddctx(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tddctx update"));
    assert!(!dir.path().join(".trae").exists());
}

#[test]
fn check_suggests_without_validating() {
    let dir = project();
    set_report(&dir, 2, 1);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    tddctx(&dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Implement minimal code"))
        .stdout(predicate::str::contains("Issues").not());
}

#[test]
fn check_validate_lists_issues() {
    let dir = project();
    set_report(&dir, 2, 1);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    tddctx(&dir)
        .args(["check", "--validate", "--issues-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COVERAGE_LOW"))
        .stdout(predicate::str::contains("G1: Requirements not validated"))
        .stdout(predicate::str::contains("Next steps").not());
}

#[test]
fn check_critical_refactor_violation_exits_1() {
    let dir = project();
    write_context(
        &dir,
        serde_json::json!({
            "project_info": {"name": "demo", "last_updated": chrono::Utc::now().to_rfc3339()},
            "test_status": {
                "total_tests": 10, "passing_tests": 9, "failing_tests": 1,
                "last_run": chrono::Utc::now().to_rfc3339()
            },
            "tdd_cycle": {"current_cycle": "REFACTOR"}
        }),
    );

    tddctx(&dir)
        .args(["check", "--validate"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("CRITICAL"))
        .stdout(predicate::str::contains("All tests must pass before refactoring"));
}

#[test]
fn check_gate_skip_exits_1() {
    let dir = project();
    set_report(&dir, 1, 0);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    tddctx(&dir)
        .args(["check", "--gate", "G4"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Cannot skip from G1 to G4"));

    tddctx(&dir)
        .args(["check", "--gate", "G2"])
        .assert()
        .success();
}

#[test]
fn check_json_report_shape() {
    let dir = project();
    set_report(&dir, 2, 1);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();

    let out = tddctx(&dir)
        .args(["check", "--validate", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(value["timestamp"].is_string());
    assert_eq!(value["context"]["project_info"]["name"].is_string(), true);
    assert!(value["issues"].is_array());
    assert!(value["suggestions"].is_array());
    assert!(value["warnings"].as_array().unwrap().is_empty());
    assert_eq!(value["summary"]["critical"], 0);
    assert_eq!(
        value["summary"]["total_issues"],
        value["issues"].as_array().unwrap().len()
    );
    assert_eq!(value["issues"][0]["type"], "COVERAGE_LOW");
}

#[test]
fn check_warns_on_stale_context() {
    let dir = project();
    write_context(
        &dir,
        serde_json::json!({
            "project_info": {"name": "demo", "last_updated": "2020-01-01T00:00:00Z"}
        }),
    );
    tddctx(&dir)
        .arg("check")
        .assert()
        .success()
        .stderr(predicate::str::contains("Context is stale"));
}

#[test]
fn check_rejects_out_of_range_thresholds() {
    let dir = project();
    std::fs::write(
        dir.path().join("tddctx.yaml"),
        "thresholds:\n  stale_tests_minutes: 4611686018427387903\n",
    )
    .unwrap();
    tddctx(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stale_tests_minutes must be between"));
}

#[test]
fn check_rejects_malformed_context() {
    let dir = project();
    write_context(&dir, serde_json::json!({"current_gate": "G1"}));
    tddctx(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed"));
}

// ---------------------------------------------------------------------------
// tddctx gate
// ---------------------------------------------------------------------------

#[test]
fn gate_complete_clears_requirement() {
    let dir = project();
    set_report(&dir, 1, 0);
    tddctx(&dir).args(["update", "--quiet"]).assert().success();
    tddctx(&dir).args(["gate", "complete", "G1"]).assert().success();

    assert_eq!(
        context(&dir)["quality_gates"]["G1"]["requirements_validated"],
        true
    );
    tddctx(&dir)
        .args(["check", "--validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("G1: Requirements").not());

    tddctx(&dir)
        .args(["gate", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* G1"));
}

// ---------------------------------------------------------------------------
// tddctx record
// ---------------------------------------------------------------------------

#[test]
fn record_updates_narrative_and_snapshot() {
    let dir = project();
    let state = dir.path().join(".trae/context");
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(
        state.join("CURRENT_STATE.md"),
        "# State\n\n**Last Updated**: 2020-01-01\n\n## Recent Activity\n",
    )
    .unwrap();
    std::fs::write(
        state.join("EVIDENCE_LOG.md"),
        "# Evidence\n\n## Evidence Registry\n",
    )
    .unwrap();

    tddctx(&dir)
        .args(["record", "Finished parser"])
        .assert()
        .success();

    let current = std::fs::read_to_string(state.join("CURRENT_STATE.md")).unwrap();
    assert!(current.contains("Finished parser"));
    assert!(!current.contains("2020-01-01"));
    let evidence = std::fs::read_to_string(state.join("EVIDENCE_LOG.md")).unwrap();
    assert!(evidence.contains("Context Update - Finished parser"));

    let snapshots = dir
        .path()
        .join("docs/UMCA/execution/evidence/context-snapshots");
    assert_eq!(std::fs::read_dir(snapshots).unwrap().count(), 1);
}

#[test]
fn record_with_missing_documents_fails_after_writing_snapshot() {
    let dir = project();
    tddctx(&dir)
        .args(["record", "Nothing to log into"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CURRENT_STATE.md"))
        .stderr(predicate::str::contains("2 of 3"));

    let snapshots = dir
        .path()
        .join("docs/UMCA/execution/evidence/context-snapshots");
    assert_eq!(std::fs::read_dir(snapshots).unwrap().count(), 1);
}
