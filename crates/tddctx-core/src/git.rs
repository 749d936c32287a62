use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit: String,
    pub branch: String,
}

/// Current revision and branch for `root`; each is `"unknown"` when git
/// is unavailable or the command fails.
pub fn git_info(root: &Path) -> GitInfo {
    GitInfo {
        commit: git_output(root, &["rev-parse", "HEAD"]),
        branch: git_output(root, &["branch", "--show-current"]),
    }
}

fn git_output(root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();
    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if text.is_empty() {
                UNKNOWN.to_string()
            } else {
                text
            }
        }
        Ok(out) => {
            tracing::debug!(?args, code = ?out.status.code(), "git command failed");
            UNKNOWN.to_string()
        }
        Err(e) => {
            tracing::debug!(?args, error = %e, "git not available");
            UNKNOWN.to_string()
        }
    }
}
