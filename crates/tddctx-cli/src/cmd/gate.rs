use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use std::path::Path;
use tddctx_core::{
    config::Config, evaluator::StateEvaluator, store::ContextStore, types::Gate,
};

#[derive(Subcommand)]
pub enum GateSubcommand {
    /// Mark a gate's completion criterion as met
    Complete {
        /// G1..G5
        gate: String,
    },
    /// Show every gate and whether its criterion is met
    List,
}

pub fn run(root: &Path, subcommand: GateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        GateSubcommand::Complete { gate } => complete(root, &gate, json),
        GateSubcommand::List => list(root, json),
    }
}

fn complete(root: &Path, raw: &str, json: bool) -> anyhow::Result<()> {
    let gate: Gate = raw.parse()?;
    let config = Config::load(root).context("failed to load tddctx.yaml")?;
    let store = ContextStore::locate_or_create(root).context("failed to prepare state directory")?;
    let now = Utc::now();
    let mut snapshot = store
        .load_or_default(&config.project_name(root), now)
        .context("failed to load development context")?;

    StateEvaluator::new(config.thresholds).complete_gate(&mut snapshot, gate, now);
    store.save(&snapshot).context("failed to save development context")?;

    if json {
        print_json(&serde_json::json!({
            "gate": gate,
            "flag": gate.completion_flag(),
            "status": "passed",
        }))?;
    } else {
        println!("{gate}: {} = true", gate.completion_flag());
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let Some(store) = ContextStore::locate(root) else {
        anyhow::bail!(
            "no development context found under {}: run 'tddctx update' first",
            root.display()
        );
    };
    let snapshot = store.load().context("failed to load development context")?;

    let rows: Vec<serde_json::Value> = Gate::all()
        .iter()
        .map(|g| {
            serde_json::json!({
                "gate": g,
                "current": *g == snapshot.current_gate,
                "flag": g.completion_flag(),
                "met": snapshot.gate_flag(*g, g.completion_flag()),
            })
        })
        .collect();

    if json {
        return print_json(&rows);
    }
    for g in Gate::all() {
        let marker = if *g == snapshot.current_gate { "*" } else { " " };
        let met = if snapshot.gate_flag(*g, g.completion_flag()) {
            "met"
        } else {
            "pending"
        };
        println!("{marker} {g}  {:<24} {met}", g.completion_flag());
    }
    Ok(())
}
