//! rlscale-env — the environment the autoscaling policies act in.
//!
//! One step maps an action to a replica count, actuates it through an
//! [`Actuator`] with bounded retries, waits for the workload to converge,
//! samples metrics and scores the result:
//!
//! ```text
//! action ─► replicas ─► scale_with_retry ─► await_ready ─► [warm-up] ─► sample ─► reward
//! ```
//!
//! The cluster is reached only through the traits in [`backend`];
//! [`SimulatedCluster`] implements them in-process.

pub mod backend;
pub mod environment;
pub mod error;
pub mod retry;
pub mod reward;
pub mod sim;
pub mod telemetry;

pub use backend::{
    Actuator, ClusterBackend, ConvergenceObserver, MetricsProvider, MetricsQuery, MetricsSample,
    Readiness, ReplicaStatus,
};
pub use environment::{EnvSettings, Environment, normalize_response_time};
pub use error::{BackendError, EnvError, EnvResult, ScaleError};
pub use retry::{RetryPolicy, ScaleOutcome, scale_with_retry};
pub use reward::{RewardBreakdown, RewardInputs, RewardModel};
pub use sim::{LoadCurve, SimConfig, SimulatedCluster};
pub use telemetry::{JsonLinesSink, LogSink, MultiSink, Point, TelemetrySink};
