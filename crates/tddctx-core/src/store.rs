//! Snapshot persistence in the discovered state directory.

use crate::error::{ContextError, Result};
use crate::io;
use crate::paths::{self, DirSearch};
use crate::snapshot::ProjectSnapshot;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ContextStore {
    dir: PathBuf,
}

impl ContextStore {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read path: use the first existing state directory, create nothing.
    pub fn locate(root: &Path) -> Option<Self> {
        DirSearch::state(root).find_existing().map(Self::at)
    }

    /// Mutate path: use or create a state directory.
    pub fn locate_or_create(root: &Path) -> Result<Self> {
        DirSearch::state(root).find_or_create().map(Self::at)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(paths::SNAPSHOT_FILE)
    }

    pub fn load(&self) -> Result<ProjectSnapshot> {
        let path = self.path();
        if !path.exists() {
            return Err(ContextError::NotFound(path));
        }
        let data = std::fs::read_to_string(&path)?;
        let mut snapshot: ProjectSnapshot =
            serde_json::from_str(&data).map_err(|e| ContextError::MalformedSnapshot {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        snapshot.normalize();
        Ok(snapshot)
    }

    /// Load, or start from a default snapshot when none has been saved yet.
    pub fn load_or_default(&self, name: &str, now: DateTime<Utc>) -> Result<ProjectSnapshot> {
        match self.load() {
            Err(ContextError::NotFound(path)) => {
                tracing::info!(path = %path.display(), "no context yet, starting fresh");
                Ok(ProjectSnapshot::new(name, now))
            }
            other => other,
        }
    }

    pub fn save(&self, snapshot: &ProjectSnapshot) -> Result<()> {
        let mut snapshot = snapshot.clone();
        snapshot.normalize();
        io::write_json(&self.path(), &snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
