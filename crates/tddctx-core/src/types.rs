use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Quality gates, in the order they must be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gate {
    G1,
    G2,
    G3,
    G4,
    G5,
}

impl Gate {
    pub fn all() -> &'static [Gate] {
        &[Gate::G1, Gate::G2, Gate::G3, Gate::G4, Gate::G5]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Gate> {
        Gate::all().get(self.index() + 1).copied()
    }

    /// True when moving to `target` would jump past the next gate.
    pub fn skips_to(self, target: Gate) -> bool {
        target > self && self.next() != Some(target)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gate::G1 => "G1",
            Gate::G2 => "G2",
            Gate::G3 => "G3",
            Gate::G4 => "G4",
            Gate::G5 => "G5",
        }
    }

    /// The flag in `quality_gates.<gate>` that records completion.
    pub fn completion_flag(self) -> &'static str {
        match self {
            Gate::G1 => "requirements_validated",
            Gate::G2 => "architecture_approved",
            Gate::G3 => "implementation_complete",
            Gate::G4 => "testing_complete",
            Gate::G5 => "deployment_ready",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Gate {
    type Err = crate::error::ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "G1" => Ok(Gate::G1),
            "G2" => Ok(Gate::G2),
            "G3" => Ok(Gate::G3),
            "G4" => Ok(Gate::G4),
            "G5" => Ok(Gate::G5),
            _ => Err(crate::error::ContextError::InvalidGate(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TddCycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TddCycle {
    #[default]
    Red,
    Green,
    Refactor,
    #[serde(other)]
    Unknown,
}

impl TddCycle {
    pub fn as_str(self) -> &'static str {
        match self {
            TddCycle::Red => "RED",
            TddCycle::Green => "GREEN",
            TddCycle::Refactor => "REFACTOR",
            TddCycle::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TddCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }

    /// Marker used by the text report.
    pub fn symbol(self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::High => "⚠️",
            Severity::Medium => "⚡",
            Severity::Low => "ℹ️",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IssueKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    TddViolation,
    CoverageLow,
    NoTestRun,
    StaleTests,
    GateSkip,
    InvalidGate,
    GateRequirement,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::TddViolation => "TDD_VIOLATION",
            IssueKind::CoverageLow => "COVERAGE_LOW",
            IssueKind::NoTestRun => "NO_TEST_RUN",
            IssueKind::StaleTests => "STALE_TESTS",
            IssueKind::GateSkip => "GATE_SKIP",
            IssueKind::InvalidGate => "INVALID_GATE",
            IssueKind::GateRequirement => "GATE_REQUIREMENT",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_order_and_next() {
        assert_eq!(Gate::G1.index(), 0);
        assert_eq!(Gate::G5.index(), 4);
        assert_eq!(Gate::G3.next(), Some(Gate::G4));
        assert_eq!(Gate::G5.next(), None);
    }

    #[test]
    fn only_jumps_past_next_gate_skip() {
        assert!(!Gate::G1.skips_to(Gate::G1));
        assert!(!Gate::G1.skips_to(Gate::G2));
        assert!(!Gate::G4.skips_to(Gate::G1));
        assert!(Gate::G1.skips_to(Gate::G3));
        assert!(Gate::G2.skips_to(Gate::G5));
    }

    #[test]
    fn gate_from_str_rejects_unknown() {
        assert_eq!("G2".parse::<Gate>().unwrap(), Gate::G2);
        assert!("G6".parse::<Gate>().is_err());
        assert!("g1".parse::<Gate>().is_err());
    }

    #[test]
    fn unknown_cycle_string_reads_as_unknown() {
        let cycle: TddCycle = serde_json::from_str("\"BLUE\"").unwrap();
        assert_eq!(cycle, TddCycle::Unknown);
        let cycle: TddCycle = serde_json::from_str("\"REFACTOR\"").unwrap();
        assert_eq!(cycle, TddCycle::Refactor);
    }

    #[test]
    fn issue_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&IssueKind::GateRequirement).unwrap();
        assert_eq!(json, "\"GATE_REQUIREMENT\"");
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
    }
}
