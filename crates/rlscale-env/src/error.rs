//! Environment and backend error types.

use thiserror::Error;

use rlscale_core::ConfigError;

/// Failure of a single scale request. Every variant is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScaleError {
    /// Another writer modified the workload concurrently.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The orchestrator answered with a server-side error.
    #[error("transient server error: {0}")]
    TransientServer(String),

    #[error("unknown scaling error: {0}")]
    Unknown(String),
}

/// Failure of a read-only backend call (replica status, metrics).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend query failed: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("action {action} out of range for {n_actions} actions")]
    InvalidAction { action: usize, n_actions: usize },

    #[error("metrics collection failed: {0}")]
    Metrics(#[source] BackendError),
}

pub type EnvResult<T> = Result<T, EnvError>;
