use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tddctx_core::{narrative::NarrativeLog, paths::DirSearch, store::ContextStore};

#[derive(Serialize)]
struct StepOutput {
    step: &'static str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `tddctx record`: log an activity entry, an evidence entry and an audit
/// snapshot. Every write is attempted; exits 1 if any failed.
pub fn run(root: &Path, description: &str, json: bool) -> anyhow::Result<()> {
    let store = ContextStore::locate_or_create(root).context("failed to prepare state directory")?;
    let evidence_dir = DirSearch::evidence(root)
        .find_or_create()
        .context("failed to prepare evidence directory")?;

    let snapshot = match store.load() {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(error = %e, "recording without project snapshot");
            None
        }
    };

    let log = NarrativeLog::new(root, store.dir(), evidence_dir);
    let steps = log.record(description, snapshot.as_ref(), Utc::now());
    let failed = steps.iter().filter(|s| s.result.is_err()).count();

    if json {
        let out: Vec<StepOutput> = steps
            .into_iter()
            .map(|s| match s.result {
                Ok(path) => StepOutput {
                    step: s.name,
                    ok: true,
                    path: Some(path),
                    error: None,
                },
                Err(e) => StepOutput {
                    step: s.name,
                    ok: false,
                    path: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();
        print_json(&out)?;
    } else {
        for step in &steps {
            match &step.result {
                Ok(path) => println!("updated {}: {}", step.name, path.display()),
                Err(e) => eprintln!("failed {}: {e}", step.name),
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of 3 context writes failed");
    }
    Ok(())
}
