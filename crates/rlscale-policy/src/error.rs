//! Error types for policies and checkpoint persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("checkpoint io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("action {action} out of range for {n_actions} actions")]
    ActionOutOfRange { action: usize, n_actions: usize },

    #[error("fuzzy configuration error: {0}")]
    Fuzzy(#[from] rlscale_fuzzy::FuzzyError),
}

impl PolicyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
