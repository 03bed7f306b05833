//! rlscale-core — shared types and configuration for the rlscale
//! autoscaling controller.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Algorithm, ControllerConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
