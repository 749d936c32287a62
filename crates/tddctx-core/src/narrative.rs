//! Human-readable activity log: `CURRENT_STATE.md`, `EVIDENCE_LOG.md`, and
//! timestamped JSON audit snapshots.

use crate::error::{ContextError, Result};
use crate::git::{git_info, GitInfo};
use crate::io;
use crate::paths::{CONTEXT_SNAPSHOTS_DIR, CURRENT_STATE_MD, EVIDENCE_LOG_MD};
use crate::snapshot::{format_timestamp, ProjectSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

const RECENT_ACTIVITY: &str = "## Recent Activity";
const EVIDENCE_REGISTRY: &str = "## Evidence Registry";
const LAST_UPDATED_PREFIX: &str = "**Last Updated**:";

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A Markdown file split at its `## ` headers. Deeper headers stay in the
/// body of the enclosing section.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    preamble: Vec<String>,
    sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq)]
struct Section {
    header: String,
    body: Vec<String>,
}

fn is_section_header(line: &str) -> bool {
    line.starts_with("## ")
}

impl Document {
    pub fn parse(text: &str) -> Self {
        let mut preamble = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        for line in text.lines() {
            if is_section_header(line) {
                sections.push(Section {
                    header: line.to_string(),
                    body: Vec::new(),
                });
            } else if let Some(section) = sections.last_mut() {
                section.body.push(line.to_string());
            } else {
                preamble.push(line.to_string());
            }
        }
        Self { preamble, sections }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let lines = self.preamble.iter().chain(
            self.sections
                .iter()
                .flat_map(|s| std::iter::once(&s.header).chain(s.body.iter())),
        );
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Put `entry` at the top of the first section whose header line
    /// contains `header`, newest first. A missing section is appended at the
    /// end of the document.
    pub fn insert_after_header(&mut self, header: &str, entry: &[String]) {
        let title = header.trim();
        let index = match self.sections.iter().position(|s| s.header.contains(title)) {
            Some(i) => i,
            None => {
                tracing::debug!(header = title, "section missing, appending");
                if self.last_line().is_some_and(|l| !l.trim().is_empty()) {
                    self.push_blank();
                }
                self.sections.push(Section {
                    header: title.to_string(),
                    body: Vec::new(),
                });
                self.sections.len() - 1
            }
        };

        let section = &mut self.sections[index];
        let existing: Vec<String> = section
            .body
            .drain(..)
            .skip_while(|l| l.trim().is_empty())
            .collect();
        section.body.push(String::new());
        section.body.extend(entry.iter().cloned());
        section.body.push(String::new());
        section.body.extend(existing);
    }

    /// Rewrite the first `**Last Updated**:` line. Returns false if none exists.
    pub fn set_last_updated(&mut self, date: &str) -> bool {
        let lines = self.preamble.iter_mut().chain(
            self.sections
                .iter_mut()
                .flat_map(|s| s.body.iter_mut()),
        );
        for line in lines {
            if line.starts_with(LAST_UPDATED_PREFIX) {
                *line = format!("{LAST_UPDATED_PREFIX} {date}");
                return true;
            }
        }
        false
    }

    fn last_line(&self) -> Option<&String> {
        match self.sections.last() {
            Some(s) => s.body.last().or(Some(&s.header)),
            None => self.preamble.last(),
        }
    }

    fn push_blank(&mut self) {
        match self.sections.last_mut() {
            Some(s) => s.body.push(String::new()),
            None => self.preamble.push(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Audit snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AuditSnapshot<'a> {
    timestamp: String,
    change_description: &'a str,
    git_info: GitInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_state: Option<AuditProjectState>,
}

#[derive(Debug, Serialize)]
struct AuditProjectState {
    current_phase: String,
    current_gate: String,
    tdd_cycle: String,
    cycles_completed: u64,
}

impl From<&ProjectSnapshot> for AuditProjectState {
    fn from(s: &ProjectSnapshot) -> Self {
        Self {
            current_phase: s.current_phase.clone(),
            current_gate: s.current_gate.to_string(),
            tdd_cycle: s.tdd_cycle.current_cycle.to_string(),
            cycles_completed: s.tdd_cycle.cycles_completed,
        }
    }
}

// ---------------------------------------------------------------------------
// NarrativeLog
// ---------------------------------------------------------------------------

/// Result of one of the writes performed by [`NarrativeLog::record`].
#[derive(Debug)]
pub struct RecordStep {
    pub name: &'static str,
    pub result: Result<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NarrativeLog {
    root: PathBuf,
    state_dir: PathBuf,
    evidence_dir: PathBuf,
}

impl NarrativeLog {
    pub fn new(
        root: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
        evidence_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            state_dir: state_dir.into(),
            evidence_dir: evidence_dir.into(),
        }
    }

    pub fn current_state_path(&self) -> PathBuf {
        self.state_dir.join(CURRENT_STATE_MD)
    }

    pub fn evidence_log_path(&self) -> PathBuf {
        self.state_dir.join(EVIDENCE_LOG_MD)
    }

    /// Attempt all three writes; one failing does not stop the others.
    pub fn record(
        &self,
        description: &str,
        snapshot: Option<&ProjectSnapshot>,
        now: DateTime<Utc>,
    ) -> Vec<RecordStep> {
        vec![
            RecordStep {
                name: CURRENT_STATE_MD,
                result: self.update_current_state(description, now),
            },
            RecordStep {
                name: EVIDENCE_LOG_MD,
                result: self.update_evidence_log(description, now),
            },
            RecordStep {
                name: "context snapshot",
                result: self.write_audit_snapshot(description, snapshot, now),
            },
        ]
    }

    pub fn update_current_state(&self, description: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        let entry = vec![
            format!("### {} - Context Update", date(now)),
            format!("- **{}**: {description}", stamp(now)),
        ];
        let path = self.current_state_path();
        edit_document(&path, RECENT_ACTIVITY, &entry, now)?;
        tracing::info!(path = %path.display(), "recorded activity");
        Ok(path)
    }

    pub fn update_evidence_log(&self, description: &str, now: DateTime<Utc>) -> Result<PathBuf> {
        let location = self.current_state_path();
        let location = location.strip_prefix(&self.root).unwrap_or(&location);
        let entry = vec![
            format!("### {} - Context Update Evidence", date(now)),
            String::new(),
            "#### Project State Update".to_string(),
            format!("- **Artifact**: Context Update - {description}"),
            "- **Type**: State Management".to_string(),
            format!("- **Timestamp**: {}", stamp(now)),
            format!("- **Location**: `{}`", location.display()),
            "- **Validation**: Automated context persistence".to_string(),
            "- **Status**: LOGGED".to_string(),
        ];
        let path = self.evidence_log_path();
        edit_document(&path, EVIDENCE_REGISTRY, &entry, now)?;
        tracing::info!(path = %path.display(), "recorded evidence");
        Ok(path)
    }

    /// Write `context-snapshots/context-YYYYMMDD-HHMMSS.json` in the evidence
    /// directory. Same-second collisions get a numeric suffix.
    pub fn write_audit_snapshot(
        &self,
        description: &str,
        snapshot: Option<&ProjectSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let dir = self.evidence_dir.join(CONTEXT_SNAPSHOTS_DIR);
        std::fs::create_dir_all(&dir)?;

        let base = format!("context-{}", now.format("%Y%m%d-%H%M%S"));
        let mut path = dir.join(format!("{base}.json"));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{base}-{n}.json"));
            n += 1;
        }

        let audit = AuditSnapshot {
            timestamp: format_timestamp(now),
            change_description: description,
            git_info: git_info(&self.root),
            project_state: snapshot.map(AuditProjectState::from),
        };
        io::write_json(&path, &audit)?;
        tracing::info!(path = %path.display(), "wrote audit snapshot");
        Ok(path)
    }
}

fn edit_document(path: &Path, header: &str, entry: &[String], now: DateTime<Utc>) -> Result<()> {
    if !path.exists() {
        return Err(ContextError::NarrativeMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let mut doc = Document::parse(&text);
    doc.insert_after_header(header, entry);
    doc.set_last_updated(&date(now));
    io::atomic_write(path, doc.render().as_bytes())
}

fn date(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
