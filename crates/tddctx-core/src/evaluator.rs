//! Compliance rules and state transitions over a [`ProjectSnapshot`].
//!
//! `evaluate` is a pure function of the snapshot and the clock: every rule
//! that applies contributes an [`Issue`], nothing is raised. `advance` folds
//! an observed test run into the snapshot and moves the TDD cycle.

use crate::config::Thresholds;
use crate::error::{ContextError, Result};
use crate::snapshot::{format_percentage, format_timestamp, CodeMetrics, ProjectSnapshot};
use crate::test_runner::RunOutcome;
use crate::types::{Gate, IssueKind, Severity, TddCycle};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Issue / Diagnosis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub issues: Vec<Issue>,
    pub suggestions: Vec<String>,
    /// Advisory only; never affects the exit status.
    pub warnings: Vec<String>,
}

impl Diagnosis {
    pub fn count(&self, severity: Severity) -> usize {
        count_severity(&self.issues, severity)
    }

    pub fn has_critical(&self) -> bool {
        self.count(Severity::Critical) > 0
    }
}

pub fn count_severity(issues: &[Issue], severity: Severity) -> usize {
    issues.iter().filter(|i| i.severity == severity).count()
}

const CRITICAL_HEADER: &str = "CRITICAL: Address critical issues before proceeding:";
const HIGH_HEADER: &str = "Address high priority issues:";
const ALL_CLEAR: &str = "No immediate issues found. Continue with current development.";
const MAX_HIGH_SUGGESTIONS: usize = 3;

// ---------------------------------------------------------------------------
// StateEvaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StateEvaluator {
    thresholds: Thresholds,
}

impl StateEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Run every rule, derive suggestions, and collect the freshness warning.
    pub fn evaluate(
        &self,
        snapshot: &ProjectSnapshot,
        target_gate: Option<&str>,
        now: DateTime<Utc>,
    ) -> Diagnosis {
        let mut issues = self.tdd_issues(snapshot, now);
        issues.extend(self.gate_issues(snapshot, target_gate));
        let suggestions = self.suggest(snapshot, &issues);
        let warnings = self.freshness(snapshot, now).into_iter().collect();
        Diagnosis {
            issues,
            suggestions,
            warnings,
        }
    }

    /// Cycle/test agreement, coverage, and test-run recency.
    pub fn tdd_issues(&self, snapshot: &ProjectSnapshot, now: DateTime<Utc>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let status = &snapshot.test_status;
        let failing = status.failing_tests;

        match snapshot.tdd_cycle.current_cycle {
            TddCycle::Red if failing == 0 => issues.push(Issue::new(
                IssueKind::TddViolation,
                Severity::High,
                "In RED phase but no failing tests found. Write failing tests first.",
            )),
            TddCycle::Green if failing > 0 => issues.push(Issue::new(
                IssueKind::TddViolation,
                Severity::High,
                "In GREEN phase but failing tests exist. Fix failing tests before proceeding.",
            )),
            TddCycle::Refactor if failing > 0 => issues.push(Issue::new(
                IssueKind::TddViolation,
                Severity::Critical,
                "In REFACTOR phase but failing tests exist. All tests must pass before refactoring.",
            )),
            _ => {}
        }

        let coverage = status.coverage();
        if coverage < self.thresholds.coverage_target {
            issues.push(Issue::new(
                IssueKind::CoverageLow,
                Severity::Medium,
                format!(
                    "Test coverage is {}%. Target is {}% minimum.",
                    format_percentage(coverage),
                    self.thresholds.coverage_target
                ),
            ));
        }

        if status.last_run.is_none() {
            issues.push(Issue::new(
                IssueKind::NoTestRun,
                Severity::High,
                "No test runs recorded. Run tests to validate current state.",
            ));
        } else if let Some(last_run) = snapshot.last_run() {
            // An unparseable timestamp is ignored rather than reported.
            if now - last_run > window(self.thresholds.stale_tests_minutes) {
                issues.push(Issue::new(
                    IssueKind::StaleTests,
                    Severity::Medium,
                    "Tests haven't been run recently. Consider running tests to ensure current state.",
                ));
            }
        }

        issues
    }

    /// Gate-skip check for an explicit target, then the current gate's criteria.
    pub fn gate_issues(&self, snapshot: &ProjectSnapshot, target_gate: Option<&str>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let current = snapshot.current_gate;

        if let Some(raw) = target_gate {
            let Ok(target) = raw.parse::<Gate>() else {
                issues.push(Issue::new(
                    IssueKind::InvalidGate,
                    Severity::High,
                    format!("Invalid target gate: {raw}. Valid gates: G1, G2, G3, G4, G5"),
                ));
                return issues;
            };
            if current.skips_to(target) {
                issues.push(Issue::new(
                    IssueKind::GateSkip,
                    Severity::Critical,
                    format!(
                        "Cannot skip from {current} to {target}. Gates must be completed sequentially."
                    ),
                ));
            }
        }

        let unmet = |severity, message: &str| {
            Issue::new(IssueKind::GateRequirement, severity, message)
        };
        match current {
            Gate::G1 if !snapshot.gate_flag(Gate::G1, Gate::G1.completion_flag()) => {
                issues.push(unmet(
                    Severity::High,
                    "G1: Requirements not validated. Complete requirements analysis.",
                ));
            }
            Gate::G2 if !snapshot.gate_flag(Gate::G2, Gate::G2.completion_flag()) => {
                issues.push(unmet(
                    Severity::High,
                    "G2: Architecture not approved. Complete architecture design and review.",
                ));
            }
            Gate::G3 if snapshot.code_metrics.total_files == 0 => {
                issues.push(unmet(
                    Severity::High,
                    "G3: No implementation files found. Begin implementation.",
                ));
            }
            Gate::G4 => {
                let status = &snapshot.test_status;
                if status.total_tests == 0 {
                    issues.push(unmet(
                        Severity::Critical,
                        "G4: No tests found. Implement comprehensive test suite.",
                    ));
                } else if status.failing_tests > 0 {
                    issues.push(unmet(
                        Severity::Critical,
                        "G4: Failing tests exist. All tests must pass for G4 completion.",
                    ));
                }
            }
            Gate::G5 if !snapshot.gate_flag(Gate::G5, Gate::G5.completion_flag()) => {
                issues.push(unmet(
                    Severity::High,
                    "G5: Deployment not ready. Complete deployment preparation.",
                ));
            }
            _ => {}
        }

        issues
    }

    /// Ordered next steps. Critical issues pre-empt everything else.
    pub fn suggest(&self, snapshot: &ProjectSnapshot, issues: &[Issue]) -> Vec<String> {
        let mut suggestions = Vec::new();

        let critical: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .collect();
        if !critical.is_empty() {
            suggestions.push(CRITICAL_HEADER.to_string());
            suggestions.extend(critical.iter().map(|i| format!("  - {}", i.message)));
            return suggestions;
        }

        let failing = snapshot.test_status.failing_tests;
        let cycle_step = match snapshot.tdd_cycle.current_cycle {
            TddCycle::Red if failing == 0 => Some("Write failing tests for the next feature"),
            TddCycle::Red => Some("Implement minimal code to make failing tests pass (GREEN phase)"),
            TddCycle::Green if failing == 0 => {
                Some("Refactor code while keeping tests green (REFACTOR phase)")
            }
            TddCycle::Green => Some("Fix failing tests before proceeding"),
            TddCycle::Refactor => {
                Some("Start next TDD cycle: Write failing tests for next feature (RED phase)")
            }
            TddCycle::Unknown => None,
        };
        suggestions.extend(cycle_step.map(String::from));

        match snapshot.current_gate {
            Gate::G1 if !snapshot.gate_flag(Gate::G1, Gate::G1.completion_flag()) => {
                suggestions.push("Complete requirements validation for G1 gate".to_string());
            }
            Gate::G2 if !snapshot.gate_flag(Gate::G2, Gate::G2.completion_flag()) => {
                suggestions.push("Complete architecture design and approval for G2 gate".to_string());
            }
            _ => {}
        }

        let coverage = snapshot.test_status.coverage();
        let target = self.thresholds.coverage_target;
        if coverage < target {
            suggestions.push(format!(
                "Improve test coverage from {}% to {}%+ ({} points short)",
                format_percentage(coverage),
                target,
                format_percentage(((target - coverage) * 100.0).round() / 100.0)
            ));
        }

        let high: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.severity == Severity::High)
            .take(MAX_HIGH_SUGGESTIONS)
            .collect();
        if !high.is_empty() {
            suggestions.push(HIGH_HEADER.to_string());
            suggestions.extend(high.iter().map(|i| format!("  - {}", i.message)));
        }

        if suggestions.is_empty() {
            suggestions.push(ALL_CLEAR.to_string());
        }
        suggestions
    }

    /// Staleness warning for the snapshot itself, if any.
    pub fn freshness(&self, snapshot: &ProjectSnapshot, now: DateTime<Utc>) -> Option<String> {
        let Some(raw) = snapshot.project_info.last_updated.as_deref() else {
            return Some("No last updated timestamp found".to_string());
        };
        let Some(last_updated) = snapshot.last_updated() else {
            return Some("Invalid timestamp format".to_string());
        };
        if now - last_updated > window(self.thresholds.stale_context_minutes) {
            return Some(format!("Context is stale (last updated: {raw})"));
        }
        None
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Fold an observed test run (and optionally fresh code metrics) into the
    /// snapshot, then move the TDD cycle if the run completed.
    pub fn advance(
        &self,
        snapshot: &mut ProjectSnapshot,
        outcome: &RunOutcome,
        metrics: Option<CodeMetrics>,
        now: DateTime<Utc>,
    ) {
        let stamp = monotonic_stamp(snapshot, now);
        let stamp_str = format_timestamp(stamp);

        let status = &mut snapshot.test_status;
        match outcome {
            Ok(report) => {
                status.total_tests = report.counts.total;
                status.passing_tests = report.counts.passing;
                status.failing_tests = report.counts.failing;
                status.last_run = Some(format_timestamp(report.finished_at));
                status.success = true;
                status.last_error = None;
                status.note = report.note.clone();
            }
            Err(e) => {
                tracing::warn!(error = %e, "test run failed; keeping previous counts");
                status.last_run = Some(stamp_str.clone());
                status.success = false;
                status.last_error = Some(e.to_string());
                status.note = None;
            }
        }
        status.recompute_coverage();

        if let Some(metrics) = metrics {
            snapshot.code_metrics = metrics;
        }

        if outcome.is_ok() {
            self.transition_cycle(snapshot, &stamp_str);
        }

        snapshot.project_info.last_updated = Some(stamp_str);
    }

    /// Refresh code metrics and the update stamp without a test run.
    pub fn touch(
        &self,
        snapshot: &mut ProjectSnapshot,
        metrics: Option<CodeMetrics>,
        now: DateTime<Utc>,
    ) {
        let stamp = format_timestamp(monotonic_stamp(snapshot, now));
        if let Some(metrics) = metrics {
            snapshot.code_metrics = metrics;
        }
        snapshot.project_info.last_updated = Some(stamp);
    }

    fn transition_cycle(&self, snapshot: &mut ProjectSnapshot, stamp: &str) {
        let failing = snapshot.test_status.failing_tests;
        let passing = snapshot.test_status.passing_tests;
        let cycle = &mut snapshot.tdd_cycle;
        let before = cycle.current_cycle;

        if failing > 0 {
            cycle.current_cycle = TddCycle::Red;
            cycle.last_red_phase = Some(stamp.to_string());
        } else if passing > 0 {
            match cycle.current_cycle {
                TddCycle::Red => {
                    cycle.current_cycle = TddCycle::Green;
                    cycle.last_green_phase = Some(stamp.to_string());
                }
                TddCycle::Green => {
                    cycle.current_cycle = TddCycle::Refactor;
                    cycle.last_refactor_phase = Some(stamp.to_string());
                    cycle.cycles_completed += 1;
                }
                // Leaving REFACTOR is a deliberate act, never automatic.
                TddCycle::Refactor | TddCycle::Unknown => {}
            }
        }

        if before != cycle.current_cycle {
            tracing::info!(from = %before, to = %cycle.current_cycle, "tdd cycle transition");
        }
    }

    /// Move to `target`, refusing to skip ahead unless `force` is set.
    /// Staying put or going back is always allowed.
    pub fn set_gate(&self, snapshot: &mut ProjectSnapshot, target: Gate, force: bool) -> Result<()> {
        let current = snapshot.current_gate;
        if current.skips_to(target) && !force {
            return Err(ContextError::GateSkip {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        if target != current {
            tracing::info!(from = %current, to = %target, force, "gate change");
        }
        snapshot.current_gate = target;
        Ok(())
    }

    /// Record a gate's completion criterion as met.
    pub fn complete_gate(&self, snapshot: &mut ProjectSnapshot, gate: Gate, now: DateTime<Utc>) {
        let stamp = format_timestamp(monotonic_stamp(snapshot, now));
        let record = snapshot.gate_record_mut(gate);
        record.flags.insert(
            gate.completion_flag().to_string(),
            serde_json::Value::Bool(true),
        );
        record.status = "passed".to_string();
        snapshot.project_info.last_updated = Some(stamp);
    }
}

/// Staleness window; negative counts as zero, overflow saturates.
fn window(minutes: i64) -> Duration {
    Duration::try_minutes(minutes.max(0)).unwrap_or(Duration::MAX)
}

/// `now`, unless the snapshot already claims a later update.
fn monotonic_stamp(snapshot: &ProjectSnapshot, now: DateTime<Utc>) -> DateTime<Utc> {
    snapshot.last_updated().map_or(now, |prev| prev.max(now))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
