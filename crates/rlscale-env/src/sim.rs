//! In-process cluster simulation.
//!
//! `SimulatedCluster` stands in for an orchestrator plus metrics store. A
//! load curve drives request demand; CPU follows demand per ready replica,
//! memory follows CPU, and latency grows with utilization like a simple
//! queue. New replicas take a few readiness polls to come up, and scale
//! requests can be made to fail with conflicts.

use std::f64::consts::TAU;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rlscale_core::WorkloadRef;

use crate::backend::{
    Actuator, ConvergenceObserver, MetricsProvider, MetricsQuery, MetricsSample, ReplicaStatus,
};
use crate::error::{BackendError, ScaleError};

/// Utilization beyond which the queue is treated as saturated.
const SATURATION: f64 = 0.95;
/// Latency multiplier once saturated.
const SATURATED_LATENCY_FACTOR: f64 = 20.0;

/// Request demand as a function of the sample index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadCurve {
    Constant { rps: f64 },
    /// `base + amplitude · sin(2π · t / period)`, floored at zero.
    Sine { base: f64, amplitude: f64, period: u32 },
    /// Cycles through the listed values.
    Steps { rps: Vec<f64> },
}

impl LoadCurve {
    pub fn at(&self, tick: u64) -> f64 {
        let rps = match self {
            Self::Constant { rps } => *rps,
            Self::Sine {
                base,
                amplitude,
                period,
            } => {
                let period = f64::from((*period).max(1));
                let phase = (tick as f64 % period) / period;
                (base + amplitude * (TAU * phase).sin()).max(0.0)
            }
            Self::Steps { rps } => {
                if rps.is_empty() {
                    0.0
                } else {
                    rps[(tick % rps.len() as u64) as usize]
                }
            }
        };
        rps.max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub load: LoadCurve,
    /// Requests per second one replica serves at 100% CPU.
    pub capacity_per_replica: f64,
    /// Latency of an idle replica in milliseconds.
    pub base_latency_ms: f64,
    /// Memory usage of an idle replica, percent.
    pub base_memory: f64,
    /// Additional memory per point of CPU, percent.
    pub memory_per_cpu: f64,
    /// Readiness polls before newly requested replicas report ready.
    pub startup_polls: u32,
    /// Probability that a scale request fails with a conflict.
    pub conflict_rate: f64,
    /// Relative multiplicative noise on every metric.
    pub noise: f64,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            load: LoadCurve::Sine {
                base: 300.0,
                amplitude: 200.0,
                period: 40,
            },
            capacity_per_replica: 80.0,
            base_latency_ms: 20.0,
            base_memory: 20.0,
            memory_per_cpu: 0.5,
            startup_polls: 1,
            conflict_rate: 0.0,
            noise: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug)]
struct SimState {
    desired: u32,
    ready: u32,
    pending_polls: u32,
    tick: u64,
    scale_requests: u64,
    conflicts: u64,
    rng: StdRng,
}

#[derive(Debug)]
pub struct SimulatedCluster {
    config: SimConfig,
    state: Mutex<SimState>,
}

impl SimulatedCluster {
    pub fn new(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            state: Mutex::new(SimState {
                desired: 0,
                ready: 0,
                pending_polls: 0,
                tick: 0,
                scale_requests: 0,
                conflicts: 0,
                rng,
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn desired(&self) -> u32 {
        self.lock().desired
    }

    pub fn ready(&self) -> u32 {
        self.lock().ready
    }

    /// Scale requests received, including rejected ones.
    pub fn scale_requests(&self) -> u64 {
        self.lock().scale_requests
    }

    pub fn conflicts_injected(&self) -> u64 {
        self.lock().conflicts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Metrics for the current demand spread across `ready` replicas.
    fn measure(&self, state: &mut SimState) -> MetricsSample {
        let demand = self.config.load.at(state.tick);
        state.tick += 1;

        let ready = state.ready;
        if ready == 0 {
            return MetricsSample {
                cpu_usage: 0.0,
                memory_usage: 0.0,
                response_time_ms: f64::NAN,
                collected: 0,
            };
        }

        let capacity = f64::from(ready) * self.config.capacity_per_replica;
        let utilization = if capacity > 0.0 { demand / capacity } else { 1.0 };

        let cpu = (utilization * 100.0).min(100.0);
        let memory = self.config.base_memory + self.config.memory_per_cpu * cpu;
        let latency = if utilization < SATURATION {
            self.config.base_latency_ms / (1.0 - utilization)
        } else {
            self.config.base_latency_ms * SATURATED_LATENCY_FACTOR * utilization / SATURATION
        };

        let noise = self.config.noise;
        let mut jitter = || 1.0 + noise * (state.rng.random::<f64>() * 2.0 - 1.0);
        MetricsSample {
            cpu_usage: (cpu * jitter()).clamp(0.0, 100.0),
            memory_usage: (memory * jitter()).clamp(0.0, 100.0),
            response_time_ms: (latency * jitter()).max(0.0),
            collected: ready,
        }
    }
}

impl Actuator for SimulatedCluster {
    async fn scale(
        &self,
        workload: &WorkloadRef,
        replicas: u32,
        _timeout: Duration,
    ) -> Result<(), ScaleError> {
        let mut state = self.lock();
        state.scale_requests += 1;
        if state.rng.random::<f64>() < self.config.conflict_rate {
            state.conflicts += 1;
            return Err(ScaleError::Conflict(format!(
                "the object {workload} has been modified"
            )));
        }

        if replicas != state.desired {
            debug!(workload = %workload, from = state.desired, to = replicas, "simulated scale");
        }
        state.desired = replicas;
        if replicas <= state.ready {
            state.ready = replicas;
            state.pending_polls = 0;
        } else {
            state.pending_polls = self.config.startup_polls;
        }
        Ok(())
    }
}

impl ConvergenceObserver for SimulatedCluster {
    async fn replica_status(&self, _workload: &WorkloadRef) -> Result<ReplicaStatus, BackendError> {
        let mut state = self.lock();
        if state.ready < state.desired {
            if state.pending_polls == 0 {
                state.ready = state.desired;
            } else {
                state.pending_polls -= 1;
            }
        }
        Ok(ReplicaStatus {
            ready: state.ready,
            desired: state.desired,
        })
    }
}

impl MetricsProvider for SimulatedCluster {
    async fn sample(
        &self,
        _workload: &WorkloadRef,
        _query: MetricsQuery,
    ) -> Result<MetricsSample, BackendError> {
        let mut state = self.lock();
        Ok(self.measure(&mut state))
    }
}
