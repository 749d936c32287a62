//! Invoking the project's test suite and reading its results.
//!
//! The suite is run as a blocking shell command with a timeout. Results are
//! read best-effort: a Jest-style JSON report anywhere in stdout, else the
//! Jest or libtest text summary. An unparseable but successful run is still
//! a completed run with zero counts.

use crate::config::TestsConfig;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TEST_COMMAND: &str = "npm test -- --reporter=json";

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TestCounts {
    pub total: u64,
    pub passing: u64,
    pub failing: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub counts: TestCounts,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("No package.json found")]
    MissingManifest(PathBuf),

    #[error("No test script defined in package.json")]
    MissingScript,

    #[error("test program not found on PATH: {0}")]
    ProgramNotFound(String),

    #[error("Failed to run tests: {0}")]
    Spawn(String),

    #[error("Test execution timed out after {0}s")]
    TimedOut(u64),

    #[error("Tests failed with exit code {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    Failed { code: Option<i32>, stderr: String },
}

/// What the evaluator folds into a snapshot after a test invocation.
pub type RunOutcome = std::result::Result<TestReport, RunError>;

pub trait TestRunner {
    fn run(&self, root: &Path) -> RunOutcome;
}

// ---------------------------------------------------------------------------
// CommandTestRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    command: String,
    timeout: Duration,
    npm_preflight: bool,
}

impl CommandTestRunner {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
            npm_preflight: false,
        }
    }

    pub fn from_config(config: &TestsConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds);
        match &config.command {
            Some(cmd) => Self::new(cmd.clone(), timeout),
            None => Self {
                command: DEFAULT_TEST_COMMAND.to_string(),
                timeout,
                npm_preflight: true,
            },
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn preflight(&self, root: &Path) -> std::result::Result<(), RunError> {
        if !self.npm_preflight {
            return Ok(());
        }
        let manifest = root.join("package.json");
        if !manifest.exists() {
            return Err(RunError::MissingManifest(manifest));
        }
        let data = std::fs::read_to_string(&manifest).map_err(|e| RunError::Spawn(e.to_string()))?;
        let pkg: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| RunError::Spawn(e.to_string()))?;
        if pkg.pointer("/scripts/test").is_none() {
            return Err(RunError::MissingScript);
        }
        if which::which("npm").is_err() {
            return Err(RunError::ProgramNotFound("npm".to_string()));
        }
        Ok(())
    }
}

impl TestRunner for CommandTestRunner {
    fn run(&self, root: &Path) -> RunOutcome {
        self.preflight(root)?;
        tracing::info!(command = %self.command, "running test suite");
        let output = execute(&self.command, root, self.timeout)?;
        let finished_at = Utc::now();
        let counts = parse_counts(&output.stdout);
        tracing::debug!(code = ?output.code, ?counts, "test command finished");

        match (output.success, counts) {
            (_, Some(counts)) => Ok(TestReport {
                counts,
                finished_at,
                note: None,
            }),
            (true, None) => Ok(TestReport {
                counts: TestCounts::default(),
                finished_at,
                note: Some("Tests ran but output not parseable".to_string()),
            }),
            (false, None) => Err(RunError::Failed {
                code: output.code,
                stderr: output.stderr,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Process execution
// ---------------------------------------------------------------------------

struct CommandOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

/// Run `command` through `sh -c`, reading both pipes on their own threads and
/// waiting on a third so the timeout needs no polling.
fn execute(
    command: &str,
    cwd: &Path,
    timeout: Duration,
) -> std::result::Result<CommandOutput, RunError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own process group, so a timeout takes down npm/node along with sh.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = cmd.spawn().map_err(|e| RunError::Spawn(e.to_string()))?;

    let child_pid = child.id();
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || read_all(stdout_handle));
    let stderr_thread = std::thread::spawn(move || read_all(stderr_handle));

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(child.wait());
    });

    let status = match rx.recv_timeout(timeout) {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => return Err(RunError::Spawn(format!("wait failed: {e}"))),
        Err(_) => {
            kill_process(child_pid);
            tracing::warn!(secs = timeout.as_secs(), "test command timed out");
            return Err(RunError::TimedOut(timeout.as_secs()));
        }
    };

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout: stdout_thread.join().unwrap_or_default(),
        stderr: stderr_thread.join().unwrap_or_default(),
    })
}

fn read_all<R: Read>(handle: Option<R>) -> String {
    let mut buf = String::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_string(&mut buf);
    }
    buf
}

/// Best-effort SIGKILL of the child's process group on unix, of the child
/// alone elsewhere.
fn kill_process(pid: u32) {
    let target = if cfg!(unix) {
        format!("-{pid}")
    } else {
        pid.to_string()
    };
    let _ = Command::new("kill")
        .arg("-9")
        .arg("--")
        .arg(target)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// Extract test counts from runner output, trying JSON before text summaries.
pub fn parse_counts(stdout: &str) -> Option<TestCounts> {
    parse_json_report(stdout)
        .or_else(|| parse_jest_summary(stdout))
        .or_else(|| parse_libtest_summary(stdout))
}

fn parse_json_report(stdout: &str) -> Option<TestCounts> {
    let trimmed = stdout.trim();
    let value: serde_json::Value = serde_json::from_str(trimmed).ok().or_else(|| {
        // npm prints a banner before the reporter output
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        (start < end)
            .then(|| serde_json::from_str(&trimmed[start..=end]).ok())
            .flatten()
    })?;
    let total = value.get("numTotalTests")?.as_u64()?;
    let field = |k: &str| value.get(k).and_then(|v| v.as_u64()).unwrap_or(0);
    Some(TestCounts {
        total,
        passing: field("numPassedTests"),
        failing: field("numFailedTests"),
    })
}

static JEST_LINE_RE: OnceLock<Regex> = OnceLock::new();
static JEST_PART_RE: OnceLock<Regex> = OnceLock::new();
static LIBTEST_RE: OnceLock<Regex> = OnceLock::new();

fn parse_jest_summary(stdout: &str) -> Option<TestCounts> {
    let line_re = JEST_LINE_RE.get_or_init(|| Regex::new(r"(?m)^\s*Tests:\s+(.*)$").unwrap());
    let part_re =
        JEST_PART_RE.get_or_init(|| Regex::new(r"(\d+)\s+(failed|passed|total)").unwrap());
    let line = line_re.captures(stdout)?.get(1)?.as_str();
    let mut counts = TestCounts::default();
    let mut saw_total = false;
    for cap in part_re.captures_iter(line) {
        let n: u64 = cap[1].parse().ok()?;
        match &cap[2] {
            "failed" => counts.failing = n,
            "passed" => counts.passing = n,
            _ => {
                counts.total = n;
                saw_total = true;
            }
        }
    }
    saw_total.then_some(counts)
}

fn parse_libtest_summary(stdout: &str) -> Option<TestCounts> {
    let re = LIBTEST_RE.get_or_init(|| {
        Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed").unwrap()
    });
    let mut found = false;
    let mut counts = TestCounts::default();
    for cap in re.captures_iter(stdout) {
        found = true;
        counts.passing += cap[1].parse::<u64>().unwrap_or(0);
        counts.failing += cap[2].parse::<u64>().unwrap_or(0);
    }
    counts.total = counts.passing + counts.failing;
    found.then_some(counts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
