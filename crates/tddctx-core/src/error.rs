use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no development context at {0}: run 'tddctx update' first")]
    NotFound(PathBuf),

    #[error("malformed development context at {path}: {reason}")]
    MalformedSnapshot { path: PathBuf, reason: String },

    #[error("invalid gate '{0}': valid gates are G1, G2, G3, G4, G5")]
    InvalidGate(String),

    #[error("cannot skip from {from} to {to}: gates must be completed sequentially")]
    GateSkip { from: String, to: String },

    #[error("invalid configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("narrative document not found: {0}")]
    NarrativeMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;
