use crate::output::{print_issue, print_json, print_section};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tddctx_core::{
    config::Config,
    evaluator::{Diagnosis, StateEvaluator},
    snapshot::{format_percentage, format_timestamp, ProjectSnapshot},
    store::ContextStore,
    types::Severity,
};

pub struct CheckArgs {
    pub gate: Option<String>,
    pub validate: bool,
    pub issues_only: bool,
}

#[derive(Serialize)]
struct Summary {
    total_issues: usize,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    timestamp: String,
    context: &'a ProjectSnapshot,
    #[serde(flatten)]
    diagnosis: &'a Diagnosis,
    summary: Summary,
}

/// `tddctx check` never writes. Exits 1 when any CRITICAL issue is found.
pub fn run(root: &Path, args: CheckArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load tddctx.yaml")?;
    let Some(store) = ContextStore::locate(root) else {
        anyhow::bail!(
            "no development context found under {}: run 'tddctx update' first",
            root.display()
        );
    };
    let snapshot = store.load().context("failed to load development context")?;

    let evaluator = StateEvaluator::new(config.thresholds);
    let now = Utc::now();

    let validating = args.validate || args.gate.is_some();
    let mut diagnosis = Diagnosis::default();
    if validating {
        diagnosis.issues = evaluator.tdd_issues(&snapshot, now);
        diagnosis
            .issues
            .extend(evaluator.gate_issues(&snapshot, args.gate.as_deref()));
    }
    if !args.issues_only {
        diagnosis.suggestions = evaluator.suggest(&snapshot, &diagnosis.issues);
    }
    diagnosis.warnings = evaluator.freshness(&snapshot, now).into_iter().collect();

    if json {
        let summary = Summary {
            total_issues: diagnosis.issues.len(),
            critical: diagnosis.count(Severity::Critical),
            high: diagnosis.count(Severity::High),
            medium: diagnosis.count(Severity::Medium),
            low: diagnosis.count(Severity::Low),
        };
        print_json(&CheckReport {
            timestamp: format_timestamp(now),
            context: &snapshot,
            diagnosis: &diagnosis,
            summary,
        })?;
    } else {
        for warning in &diagnosis.warnings {
            eprintln!("warning: {warning}");
        }
        print_text(&snapshot, &diagnosis, validating, args.issues_only);
    }

    if diagnosis.has_critical() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text(snapshot: &ProjectSnapshot, diagnosis: &Diagnosis, validating: bool, issues_only: bool) {
    let status = &snapshot.test_status;
    println!("Project: {}", snapshot.project_info.name);
    println!("Phase:   {}", snapshot.current_phase);
    println!("Gate:    {}", snapshot.current_gate);
    println!(
        "Cycle:   {} ({} completed)",
        snapshot.tdd_cycle.current_cycle, snapshot.tdd_cycle.cycles_completed
    );
    println!(
        "Tests:   {} passing, {} failing, {} total ({}% coverage)",
        status.passing_tests,
        status.failing_tests,
        status.total_tests,
        format_percentage(status.coverage())
    );
    if let Some(err) = &status.last_error {
        println!("Last test error: {err}");
    }

    if validating {
        print_section("Issues");
        if diagnosis.issues.is_empty() {
            println!("No compliance issues found.");
        }
        for issue in &diagnosis.issues {
            print_issue(issue);
        }
    }

    if !issues_only {
        print_section("Next steps");
        for suggestion in &diagnosis.suggestions {
            println!("{suggestion}");
        }
    }
}
