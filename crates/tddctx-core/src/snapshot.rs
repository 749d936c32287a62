//! The persisted development context: test counts, TDD cycle, gate flags.
//!
//! The on-disk layout is shared with hand-edited files, so everything except
//! `project_info` is optional and numeric fields are read leniently.

use crate::types::{Gate, TddCycle};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(v.as_bool().unwrap_or(false))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_cycle<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<TddCycle, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or(TddCycle::Unknown))
}

/// Parse a persisted timestamp.
///
/// Accepts RFC 3339 (`...Z` / `...+00:00`) and naive ISO-8601, which is
/// taken as local time. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Passing ratio as a percentage rounded to two decimals; 0 when there are no tests.
pub fn coverage_percentage(passing: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = passing as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Render a percentage the way the reports show it: `70.0`, `83.33`.
pub fn format_percentage(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.1}")
    } else {
        format!("{pct}")
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_updated: Option<String>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestStatus {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_tests: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub passing_tests: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub failing_tests: u64,
    /// Derived from the counts; see [`TestStatus::recompute_coverage`].
    #[serde(default, deserialize_with = "lenient_f64")]
    pub coverage_percentage: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_run: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub success: bool,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_error: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
}

impl TestStatus {
    pub fn coverage(&self) -> f64 {
        coverage_percentage(self.passing_tests, self.total_tests)
    }

    pub fn recompute_coverage(&mut self) {
        self.coverage_percentage = self.coverage();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CodeMetrics {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_files: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_lines: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub typescript_files: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub component_files: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub test_files: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DevelopmentState {
    #[serde(default)]
    pub features_completed: Vec<String>,
    #[serde(default)]
    pub features_in_progress: Vec<String>,
    #[serde(default)]
    pub features_planned: Vec<String>,
    #[serde(default)]
    pub blockers: Vec<String>,
    #[serde(default)]
    pub technical_debt: Vec<String>,
}

/// Per-gate record: a status label plus gate-specific boolean flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    #[serde(default = "default_gate_status")]
    pub status: String,
    #[serde(flatten)]
    pub flags: BTreeMap<String, Value>,
}

fn default_gate_status() -> String {
    "pending".to_string()
}

impl GateRecord {
    pub fn pending(gate: Gate) -> Self {
        let mut flags = BTreeMap::new();
        flags.insert(gate.completion_flag().to_string(), Value::Bool(false));
        Self {
            status: default_gate_status(),
            flags,
        }
    }

    /// A flag that is absent or not a boolean reads as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TddCycleState {
    #[serde(default, deserialize_with = "lenient_cycle")]
    pub current_cycle: TddCycle,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub cycles_completed: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_red_phase: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_green_phase: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_refactor_phase: Option<String>,
}

// ---------------------------------------------------------------------------
// ProjectSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_info: ProjectInfo,
    #[serde(default = "default_phase")]
    pub current_phase: String,
    #[serde(default = "default_gate")]
    pub current_gate: Gate,
    #[serde(default)]
    pub test_status: TestStatus,
    #[serde(default)]
    pub code_metrics: CodeMetrics,
    #[serde(default)]
    pub development_state: DevelopmentState,
    #[serde(default = "default_quality_gates")]
    pub quality_gates: BTreeMap<String, GateRecord>,
    #[serde(default)]
    pub tdd_cycle: TddCycleState,
    /// Keys this version does not know about, kept so a save never drops them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_phase() -> String {
    "setup".to_string()
}

fn default_gate() -> Gate {
    Gate::G1
}

fn default_quality_gates() -> BTreeMap<String, GateRecord> {
    Gate::all()
        .iter()
        .map(|g| (g.as_str().to_string(), GateRecord::pending(*g)))
        .collect()
}

impl ProjectSnapshot {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            project_info: ProjectInfo {
                name: name.into(),
                version: default_version(),
                last_updated: Some(format_timestamp(now)),
            },
            current_phase: default_phase(),
            current_gate: default_gate(),
            test_status: TestStatus::default(),
            code_metrics: CodeMetrics::default(),
            development_state: DevelopmentState::default(),
            quality_gates: default_quality_gates(),
            tdd_cycle: TddCycleState::default(),
            extra: BTreeMap::new(),
        }
    }

    pub fn gate_flag(&self, gate: Gate, flag: &str) -> bool {
        self.quality_gates
            .get(gate.as_str())
            .map(|r| r.flag(flag))
            .unwrap_or(false)
    }

    pub fn gate_record_mut(&mut self, gate: Gate) -> &mut GateRecord {
        self.quality_gates
            .entry(gate.as_str().to_string())
            .or_insert_with(|| GateRecord::pending(gate))
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.project_info
            .last_updated
            .as_deref()
            .and_then(parse_timestamp)
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.test_status.last_run.as_deref().and_then(parse_timestamp)
    }

    /// Re-derive fields that must never drift from their sources.
    pub fn normalize(&mut self) {
        self.test_status.recompute_coverage();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
