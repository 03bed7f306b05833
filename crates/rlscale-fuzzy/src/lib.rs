//! rlscale-fuzzy — fuzzy inference over workload metrics.
//!
//! Turns raw metrics into linguistic memberships, combines them with a
//! small rule base, and reduces the result to a scalar influence in
//! `[-1, 1]` (negative favours scaling down, positive scaling up).
//!
//! # Pipeline
//!
//! ```text
//! Observation
//!   └── fuzzify()      → FuzzyState      (metric → label → degree)
//!       └── apply_rules() → ActionMemberships (up / down / no change, sum 1)
//!           └── influence() → f64 in [-1, 1]
//!               └── decide() → FuzzyDecision { influence, recommendation }
//! ```

pub mod engine;
pub mod membership;

pub use engine::{ActionMemberships, FuzzyDecision, FuzzyEngine, FuzzyState, Recommendation};
pub use membership::{
    FuzzyError, FuzzyStateKey, LatencyDegrees, LatencyLevel, LatencyTerms, LoadDegrees, LoadLevel,
    LoadTerms, Trapezoid,
};
