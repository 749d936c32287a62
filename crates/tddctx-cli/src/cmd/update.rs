use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tddctx_core::{
    config::Config,
    evaluator::StateEvaluator,
    metrics::analyze_codebase,
    snapshot::{format_percentage, ProjectSnapshot},
    store::ContextStore,
    test_runner::{CommandTestRunner, TestRunner},
    types::Gate,
};

pub struct UpdateArgs {
    pub phase: Option<String>,
    pub gate: Option<String>,
    pub force: bool,
    pub quiet: bool,
    pub no_tests: bool,
}

#[derive(Serialize)]
struct UpdateOutput<'a> {
    path: PathBuf,
    context: &'a ProjectSnapshot,
}

/// `tddctx update`: load (or initialise) the context, apply phase and gate
/// changes, run tests, analyse the codebase, and save.
pub fn run(root: &Path, args: UpdateArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load tddctx.yaml")?;
    let store = ContextStore::locate_or_create(root).context("failed to prepare state directory")?;
    let now = Utc::now();
    let mut snapshot = store
        .load_or_default(&config.project_name(root), now)
        .context("failed to load development context")?;
    let evaluator = StateEvaluator::new(config.thresholds.clone());

    if let Some(phase) = args.phase {
        snapshot.current_phase = phase;
    }
    if let Some(raw) = args.gate.as_deref() {
        let gate: Gate = raw.parse()?;
        evaluator.set_gate(&mut snapshot, gate, args.force)?;
    }

    let metrics = analyze_codebase(root, &config.metrics);
    if args.no_tests {
        evaluator.touch(&mut snapshot, Some(metrics), now);
    } else {
        let runner = CommandTestRunner::from_config(&config.tests);
        tracing::info!(command = runner.command(), "running tests");
        let outcome = runner.run(root);
        evaluator.advance(&mut snapshot, &outcome, Some(metrics), now);
    }

    store.save(&snapshot).context("failed to save development context")?;
    let path = store.path();

    if json {
        return print_json(&UpdateOutput {
            path,
            context: &snapshot,
        });
    }

    if !args.quiet {
        print_summary(&snapshot, args.no_tests);
    }
    println!("Saved context to {}", path.display());
    Ok(())
}

fn print_summary(snapshot: &ProjectSnapshot, no_tests: bool) {
    let status = &snapshot.test_status;
    if no_tests {
        println!("Tests:   skipped");
    } else if let Some(err) = &status.last_error {
        println!("Tests:   run failed: {err}");
    } else {
        println!(
            "Tests:   {} passing, {} failing, {} total ({}% coverage)",
            status.passing_tests,
            status.failing_tests,
            status.total_tests,
            format_percentage(status.coverage())
        );
        if let Some(note) = &status.note {
            println!("         {note}");
        }
    }
    let metrics = &snapshot.code_metrics;
    println!(
        "Code:    {} files, {} lines ({} test files)",
        metrics.total_files, metrics.total_lines, metrics.test_files
    );
    println!("Phase:   {}", snapshot.current_phase);
    println!("Gate:    {}", snapshot.current_gate);
    println!(
        "Cycle:   {} ({} completed)",
        snapshot.tdd_cycle.current_cycle, snapshot.tdd_cycle.cycles_completed
    );
}
