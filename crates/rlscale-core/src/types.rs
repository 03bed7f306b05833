//! Domain types shared by the environment, the policies and the trainer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of the workload being scaled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub namespace: String,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Observation ───────────────────────────────────────────────────

/// Per-step state vector handed to a policy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Mean CPU usage across ready replicas, percent of limit (0–100).
    pub cpu_usage: f64,
    /// Mean memory usage across ready replicas, percent of limit (0–100).
    pub memory_usage: f64,
    /// Response time as a percentage of the SLA, capped at 100.
    /// NaN when no latency sample was available.
    pub response_time: f64,
    /// Index of the action that produced this observation.
    pub last_action: usize,
}

impl Observation {
    /// Response time with NaN mapped to zero.
    pub fn response_time_or_zero(&self) -> f64 {
        if self.response_time.is_nan() {
            0.0
        } else {
            self.response_time
        }
    }
}

/// Diagnostic record produced by every environment step.
///
/// Carries the observation plus the bookkeeping a telemetry sink needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Iterations left in the episode after this step.
    pub iteration: u32,
    pub action: usize,
    pub reward: f64,
    pub terminated: bool,
    /// Replica count requested for this step.
    pub replica_state: u32,
    /// Ready replicas observed after convergence.
    pub ready_replicas: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Normalized response time (percent of SLA, capped at 100).
    pub response_time: f64,
    /// Raw response time in milliseconds.
    pub response_time_ms: f64,
    pub last_action: usize,
}

/// Outcome of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub info: StepInfo,
}
