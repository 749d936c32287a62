use crate::error::{ContextError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default = "default_coverage_target")]
    pub coverage_target: f64,
    #[serde(default = "default_stale_tests")]
    pub stale_tests_minutes: i64,
    #[serde(default = "default_stale_context")]
    pub stale_context_minutes: i64,
}

fn default_coverage_target() -> f64 {
    80.0
}

fn default_stale_tests() -> i64 {
    30
}

fn default_stale_context() -> i64 {
    60
}

/// Upper bound for the staleness windows: one year.
pub const MAX_WINDOW_MINUTES: i64 = 60 * 24 * 365;

impl Thresholds {
    /// Reject values the evaluator cannot use meaningfully.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=100.0).contains(&self.coverage_target) {
            return Err(format!(
                "thresholds.coverage_target must be between 0 and 100, got {}",
                self.coverage_target
            ));
        }
        for (name, minutes) in [
            ("stale_tests_minutes", self.stale_tests_minutes),
            ("stale_context_minutes", self.stale_context_minutes),
        ] {
            if !(0..=MAX_WINDOW_MINUTES).contains(&minutes) {
                return Err(format!(
                    "thresholds.{name} must be between 0 and {MAX_WINDOW_MINUTES}, got {minutes}"
                ));
            }
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            coverage_target: default_coverage_target(),
            stale_tests_minutes: default_stale_tests(),
            stale_context_minutes: default_stale_context(),
        }
    }
}

// ---------------------------------------------------------------------------
// TestsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestsConfig {
    /// Shell command that runs the suite. `None` means the npm default,
    /// which also requires a `test` script in `package.json`.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    300
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_seconds: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// MetricsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    ["ts", "tsx", "js", "jsx"].map(String::from).to_vec()
}

fn default_ignore_dirs() -> Vec<String> {
    ["node_modules", "target", "dist"].map(String::from).to_vec()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub tests: TestsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load `tddctx.yaml` from the project root. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&data)?;
        config
            .thresholds
            .validate()
            .map_err(|reason| ContextError::InvalidConfig { path, reason })?;
        Ok(config)
    }

    /// Project name from config, else the root directory's name.
    pub fn project_name(&self, root: &Path) -> String {
        if let Some(name) = &self.project.name {
            return name.clone();
        }
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
