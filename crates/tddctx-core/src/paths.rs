use crate::error::Result;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "tddctx.yaml";
pub const SNAPSHOT_FILE: &str = "development_context.json";
pub const CURRENT_STATE_MD: &str = "CURRENT_STATE.md";
pub const EVIDENCE_LOG_MD: &str = "EVIDENCE_LOG.md";
pub const CONTEXT_SNAPSHOTS_DIR: &str = "context-snapshots";

pub const STATE_DIR_ENV: &str = "TDDCTX_STATE_DIR";
pub const EVIDENCE_DIR_ENV: &str = "TDDCTX_EVIDENCE_DIR";

pub const STATE_DIR_CANDIDATES: &[&str] = &[
    ".trae/context",
    "docs/UMCA/state",
    "docs/execution/state",
    ".umca/state",
    "state",
    "docs/state",
    "umca/state",
];
pub const STATE_DIR_FALLBACK: &str = ".tddctx-state";

pub const EVIDENCE_DIR_CANDIDATES: &[&str] = &[
    "docs/UMCA/execution/evidence",
    "docs/execution/evidence",
    ".umca/evidence",
    "evidence",
    "artifacts/evidence",
];
pub const EVIDENCE_DIR_FALLBACK: &str = ".tddctx-evidence";

/// Files whose presence marks a project root.
pub const ROOT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "pyproject.toml",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
    ".project",
    "README.md",
];

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Directory discovery
// ---------------------------------------------------------------------------

/// An ordered list of places a directory may live.
#[derive(Debug, Clone)]
pub struct DirSearch {
    pub override_dir: Option<PathBuf>,
    pub candidates: Vec<PathBuf>,
    pub fallback: PathBuf,
}

impl DirSearch {
    pub fn new(
        root: &Path,
        override_dir: Option<PathBuf>,
        candidates: &[&str],
        fallback: &str,
    ) -> Self {
        Self {
            override_dir,
            candidates: candidates.iter().map(|c| root.join(c)).collect(),
            fallback: root.join(fallback),
        }
    }

    /// State directory search, honouring `TDDCTX_STATE_DIR`.
    pub fn state(root: &Path) -> Self {
        Self::new(
            root,
            env_dir(STATE_DIR_ENV),
            STATE_DIR_CANDIDATES,
            STATE_DIR_FALLBACK,
        )
    }

    /// Evidence directory search, honouring `TDDCTX_EVIDENCE_DIR`.
    pub fn evidence(root: &Path) -> Self {
        Self::new(
            root,
            env_dir(EVIDENCE_DIR_ENV),
            EVIDENCE_DIR_CANDIDATES,
            EVIDENCE_DIR_FALLBACK,
        )
    }

    fn ordered(&self) -> impl Iterator<Item = &PathBuf> {
        self.override_dir.iter().chain(self.candidates.iter())
    }

    /// First existing directory, without creating anything.
    pub fn find_existing(&self) -> Option<PathBuf> {
        self.ordered()
            .chain(std::iter::once(&self.fallback))
            .find(|d| d.is_dir())
            .cloned()
    }

    /// First existing directory; otherwise the first candidate that can be
    /// created; otherwise the fallback, created.
    pub fn find_or_create(&self) -> Result<PathBuf> {
        if let Some(dir) = self.find_existing() {
            tracing::debug!(dir = %dir.display(), "using existing directory");
            return Ok(dir);
        }
        for dir in self.ordered() {
            match std::fs::create_dir_all(dir) {
                Ok(()) => {
                    tracing::info!(dir = %dir.display(), "created directory");
                    return Ok(dir.clone());
                }
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "cannot create candidate");
                }
            }
        }
        std::fs::create_dir_all(&self.fallback)?;
        tracing::info!(dir = %self.fallback.display(), "using fallback directory");
        Ok(self.fallback.clone())
    }
}

fn env_dir(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Walk upward from `start` to the first directory holding a root marker.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| ROOT_MARKERS.iter().any(|m| dir.join(m).exists()))
        .map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn search(root: &Path, override_dir: Option<PathBuf>) -> DirSearch {
        DirSearch::new(
            root,
            override_dir,
            STATE_DIR_CANDIDATES,
            STATE_DIR_FALLBACK,
        )
    }

    #[test]
    fn nothing_exists_means_no_existing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(search(dir.path(), None).find_existing().is_none());
    }

    #[test]
    fn first_existing_candidate_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("state")).unwrap();
        std::fs::create_dir_all(dir.path().join("docs/UMCA/state")).unwrap();
        let found = search(dir.path(), None).find_existing().unwrap();
        assert_eq!(found, dir.path().join("docs/UMCA/state"));
    }

    #[test]
    fn override_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("custom");
        std::fs::create_dir_all(&custom).unwrap();
        std::fs::create_dir_all(dir.path().join(".trae/context")).unwrap();
        let found = search(dir.path(), Some(custom.clone()))
            .find_existing()
            .unwrap();
        assert_eq!(found, custom);
    }

    #[test]
    fn create_uses_override_when_given() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("elsewhere/state");
        let created = search(dir.path(), Some(custom.clone()))
            .find_or_create()
            .unwrap();
        assert_eq!(created, custom);
        assert!(custom.is_dir());
    }

    #[test]
    fn create_uses_first_candidate() {
        let dir = TempDir::new().unwrap();
        let created = search(dir.path(), None).find_or_create().unwrap();
        assert_eq!(created, dir.path().join(".trae/context"));
        assert!(created.is_dir());
    }

    #[test]
    fn project_root_found_from_nested_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("src/components");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_project_root(&nested).unwrap(), dir.path());
    }
}
