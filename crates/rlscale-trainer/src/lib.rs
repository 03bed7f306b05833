//! rlscale-trainer — runs autoscaling policies against an environment.
//!
//! [`Trainer`] drives episodes, feeds transitions to the policy and keeps
//! checkpoints under a per-run [`RunLayout`]. [`Trainer::evaluate`] runs
//! the same loop greedily without learning.

pub mod error;
pub mod layout;
pub mod trainer;

pub use error::{TrainError, TrainResult};
pub use layout::RunLayout;
pub use trainer::{EpisodeReport, EvaluationReport, Trainer, TrainingReport};
