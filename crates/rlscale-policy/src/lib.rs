//! rlscale-policy — action-selection policies for the autoscaling controller.
//!
//! Three variants share one Q-learning core ([`learner::QLearner`]) and
//! differ only in how they key states and pick actions:
//!
//! - [`QLearningPolicy`]: integer-discretized observations, epsilon-greedy.
//! - [`FuzzyHybridPolicy`]: fuzzy-labeled states, Q values blended with a
//!   Gaussian preference around the fuzzy influence.
//! - [`FuzzyOverridePolicy`]: tabular Q-learning where the fuzzy
//!   recommendation occasionally picks one of three anchor actions.
//!
//! [`Policy`] wraps them as a closed enum chosen from configuration.

pub mod checkpoint;
pub mod error;
pub mod fuzzy_override;
pub mod hybrid;
pub mod learner;
pub mod policy;
pub mod table;
pub mod tabular;

pub use checkpoint::{Checkpoint, QEntry};
pub use error::{PolicyError, PolicyResult};
pub use fuzzy_override::FuzzyOverridePolicy;
pub use hybrid::FuzzyHybridPolicy;
pub use learner::{Hyperparameters, QLearner};
pub use policy::{Policy, PolicyStateKey, PolicySummary, StateSummary};
pub use table::QTable;
pub use tabular::{QLearningPolicy, TabularKey};
