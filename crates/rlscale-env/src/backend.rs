//! Contracts between the environment and the cluster it controls.
//!
//! The environment never talks to an orchestrator or a metrics store
//! directly; it goes through these traits. `SimulatedCluster` in
//! [`crate::sim`] implements all three.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rlscale_core::WorkloadRef;

use crate::error::{BackendError, ScaleError};

/// Resizes a workload. Requests must be idempotent: asking twice for the
/// same count is the same as asking once.
pub trait Actuator: Send + Sync {
    fn scale(
        &self,
        workload: &WorkloadRef,
        replicas: u32,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), ScaleError>> + Send;
}

/// Replica counts reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub ready: u32,
    pub desired: u32,
}

/// Outcome of waiting for a workload to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    /// Whether every desired replica became ready in time.
    pub ready: bool,
    pub desired: u32,
    /// Last observed ready count.
    pub ready_count: u32,
}

pub trait ConvergenceObserver: Send + Sync {
    fn replica_status(
        &self,
        workload: &WorkloadRef,
    ) -> impl Future<Output = Result<ReplicaStatus, BackendError>> + Send;

    /// Poll [`replica_status`](Self::replica_status) until `desired > 0`
    /// replicas are ready or `timeout` elapses. Status errors are logged
    /// and polled again.
    fn await_ready(
        &self,
        workload: &WorkloadRef,
        desired: u32,
        timeout: Duration,
        poll_interval: Duration,
    ) -> impl Future<Output = Readiness> + Send {
        async move {
            let mut ready_count = 0;
            let converged = tokio::time::timeout(timeout, async {
                loop {
                    match self.replica_status(workload).await {
                        Ok(status) => {
                            ready_count = status.ready;
                            if desired > 0 && status.ready == desired {
                                return;
                            }
                            debug!(
                                workload = %workload,
                                ready = status.ready,
                                desired,
                                "waiting for replicas"
                            );
                        }
                        Err(e) => {
                            debug!(workload = %workload, error = %e, "replica status unavailable");
                        }
                    }
                    tokio::time::sleep(poll_interval).await;
                }
            })
            .await
            .is_ok();

            Readiness {
                ready: converged,
                desired,
                ready_count,
            }
        }
    }
}

/// Parameters of one metrics query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsQuery {
    /// Replicas expected to report.
    pub replicas_expected: u32,
    /// Aggregation window.
    pub interval: Duration,
    /// Latency quantile, e.g. 0.90.
    pub quantile: f64,
    pub timeout: Duration,
}

/// Aggregated workload metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Mean CPU usage, percent of limit.
    pub cpu_usage: f64,
    /// Mean memory usage, percent of limit.
    pub memory_usage: f64,
    /// Latency at the configured quantile in milliseconds; NaN when no
    /// request was observed.
    pub response_time_ms: f64,
    /// Number of replicas that contributed a sample.
    pub collected: u32,
}

impl MetricsSample {
    /// Sample returned when collection timed out.
    pub fn empty() -> Self {
        Self {
            cpu_usage: 0.0,
            memory_usage: 0.0,
            response_time_ms: 0.0,
            collected: 0,
        }
    }
}

pub trait MetricsProvider: Send + Sync {
    fn sample(
        &self,
        workload: &WorkloadRef,
        query: MetricsQuery,
    ) -> impl Future<Output = Result<MetricsSample, BackendError>> + Send;
}

/// Everything the environment needs from a cluster.
pub trait ClusterBackend: Actuator + ConvergenceObserver + MetricsProvider {}

impl<T> ClusterBackend for T where T: Actuator + ConvergenceObserver + MetricsProvider {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Reports one more ready replica per poll.
    struct Rising {
        ready: Mutex<u32>,
        fail_first: bool,
    }

    impl ConvergenceObserver for Rising {
        async fn replica_status(&self, _: &WorkloadRef) -> Result<ReplicaStatus, BackendError> {
            let mut ready = self.ready.lock().unwrap();
            if self.fail_first && *ready == 0 {
                *ready += 1;
                return Err(BackendError::Unavailable("warming up".into()));
            }
            *ready += 1;
            Ok(ReplicaStatus {
                ready: *ready,
                desired: 3,
            })
        }
    }

    fn workload() -> WorkloadRef {
        WorkloadRef::new("default", "web")
    }

    #[tokio::test(start_paused = true)]
    async fn await_ready_converges() {
        let observer = Rising {
            ready: Mutex::new(0),
            fail_first: true,
        };
        let readiness = observer
            .await_ready(&workload(), 3, Duration::from_secs(60), Duration::from_secs(5))
            .await;
        assert_eq!(
            readiness,
            Readiness {
                ready: true,
                desired: 3,
                ready_count: 3,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn await_ready_times_out_with_last_count() {
        let observer = Rising {
            ready: Mutex::new(0),
            fail_first: false,
        };
        // Polls at t = 0, 5, 10 report 1, 2, 3 ready; 10 are never reached.
        let readiness = observer
            .await_ready(&workload(), 10, Duration::from_secs(12), Duration::from_secs(5))
            .await;
        assert!(!readiness.ready);
        assert_eq!(readiness.desired, 10);
        assert_eq!(readiness.ready_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_desired_never_converges() {
        let observer = Rising {
            ready: Mutex::new(0),
            fail_first: false,
        };
        let readiness = observer
            .await_ready(&workload(), 0, Duration::from_secs(3), Duration::from_secs(1))
            .await;
        assert!(!readiness.ready);
    }
}
