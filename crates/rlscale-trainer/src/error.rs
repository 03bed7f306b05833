//! Trainer error types.

use std::path::PathBuf;

use thiserror::Error;

use rlscale_core::ConfigError;
use rlscale_env::EnvError;
use rlscale_policy::PolicyError;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("checkpoint {} has {found} actions, environment expects {expected}", path.display())]
    ActionCountMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
}

pub type TrainResult<T> = Result<T, TrainError>;
