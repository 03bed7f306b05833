//! The environment state machine.
//!
//! Each step walks Scaling → AwaitingReadiness → Measuring and then either
//! returns to idle or reports termination once the iteration budget is
//! spent. Degraded infrastructure (exhausted retries, slow convergence,
//! an unavailable or slow metrics store) is logged and tolerated; only a
//! metrics query the backend rejects aborts the step.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use rlscale_core::{ConfigResult, ControllerConfig, Observation, StepInfo, Transition, WorkloadRef};

use crate::backend::{ClusterBackend, MetricsQuery, MetricsSample, Readiness};
use crate::error::BackendError;
use crate::error::{EnvError, EnvResult};
use crate::retry::{RetryPolicy, ScaleOutcome, scale_with_retry};
use crate::reward::{RewardInputs, RewardModel};
use crate::telemetry::{LogSink, Point, TelemetrySink};

/// Everything the environment reads from configuration, parsed once.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSettings {
    pub workload: WorkloadRef,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub n_actions: usize,
    /// Steps per episode.
    pub iteration: u32,
    pub timeout: Duration,
    pub wait_time: Duration,
    pub poll_interval: Duration,
    pub metrics_interval: Duration,
    pub metrics_quantile: f64,
    /// Response-time SLA in milliseconds.
    pub max_response_time: f64,
    pub measurement: String,
}

impl EnvSettings {
    pub fn from_config(config: &ControllerConfig) -> ConfigResult<Self> {
        Ok(Self {
            workload: config.workload.workload_ref(),
            min_replicas: config.workload.min_replicas,
            max_replicas: config.workload.max_replicas,
            n_actions: config.agent.n_actions,
            iteration: config.training.iteration,
            timeout: config.timing.timeout()?,
            wait_time: config.timing.wait_time()?,
            poll_interval: config.timing.readiness_poll_interval()?,
            metrics_interval: config.timing.metrics_interval()?,
            metrics_quantile: config.timing.metrics_quantile,
            max_response_time: config.bounds.max_response_time,
            measurement: config.telemetry.measurement.clone(),
        })
    }
}

pub struct Environment<B> {
    backend: B,
    settings: EnvSettings,
    retry: RetryPolicy,
    reward: RewardModel,
    telemetry: Arc<dyn TelemetrySink>,
    tags: BTreeMap<String, String>,
    iteration: u32,
    replica_state: u32,
    last_action: usize,
}

impl<B: ClusterBackend> Environment<B> {
    pub fn new(backend: B, settings: EnvSettings, retry: RetryPolicy, reward: RewardModel) -> Self {
        let replica_state = settings.min_replicas;
        let iteration = settings.iteration;
        Self {
            backend,
            settings,
            retry,
            reward,
            telemetry: Arc::new(LogSink),
            tags: BTreeMap::new(),
            iteration,
            replica_state,
            last_action: 0,
        }
    }

    /// Build from a validated configuration.
    pub fn from_config(backend: B, config: &ControllerConfig) -> EnvResult<Self> {
        let settings = EnvSettings::from_config(config)?;
        let retry = RetryPolicy::from_config(&config.scaling)?;
        let reward = RewardModel::new(
            config.bounds.clone(),
            config.reward.clone(),
            config.workload.min_replicas,
            config.workload.max_replicas,
        );
        Ok(Self::new(backend, settings, retry, reward))
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Extra tag attached to every telemetry point.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &EnvSettings {
        &self.settings
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn replica_state(&self) -> u32 {
        self.replica_state
    }

    pub fn last_action(&self) -> usize {
        self.last_action
    }

    /// Replica count for `action`: linear across `[min, max]`, rounded,
    /// clamped.
    pub fn action_to_replicas(&self, action: usize) -> u32 {
        let s = &self.settings;
        let percentage = if s.n_actions <= 1 {
            0.0
        } else {
            action as f64 / (s.n_actions - 1) as f64
        };
        let span = f64::from(s.max_replicas) - f64::from(s.min_replicas);
        let target = (f64::from(s.min_replicas) + percentage * span).round();
        (target.max(0.0) as u32).clamp(s.min_replicas, s.max_replicas)
    }

    /// Start a new episode at the minimum replica count.
    pub async fn reset(&mut self) -> EnvResult<Observation> {
        let previous = self.replica_state;
        self.iteration = self.settings.iteration;
        self.replica_state = self.settings.min_replicas;

        let measured = self.scale_and_measure(previous).await?;
        self.last_action = 0;

        let sample = measured.sample;
        let breakdown = self.reward.compute(&RewardInputs {
            cpu_usage: sample.cpu_usage,
            memory_usage: sample.memory_usage,
            response_time_ms: sample.response_time_ms,
            replica_state: self.replica_state,
        });
        let observation = self.observation(&sample);
        info!(
            workload = %self.settings.workload,
            replicas = self.replica_state,
            cpu = observation.cpu_usage,
            memory = observation.memory_usage,
            response_time = observation.response_time,
            "episode reset"
        );
        self.record(&StepInfo {
            iteration: self.iteration,
            action: 0,
            reward: breakdown.reward,
            terminated: false,
            replica_state: self.replica_state,
            ready_replicas: measured.readiness.ready_count,
            cpu_usage: observation.cpu_usage,
            memory_usage: observation.memory_usage,
            response_time: observation.response_time,
            response_time_ms: sample.response_time_ms,
            last_action: 0,
        });
        Ok(observation)
    }

    /// Apply `action` and report the outcome.
    pub async fn step(&mut self, action: usize) -> EnvResult<Transition> {
        if action >= self.settings.n_actions {
            return Err(EnvError::InvalidAction {
                action,
                n_actions: self.settings.n_actions,
            });
        }

        self.last_action = action;
        let previous = self.replica_state;
        self.replica_state = self.action_to_replicas(action);
        debug!(
            workload = %self.settings.workload,
            action,
            from = previous,
            to = self.replica_state,
            "applying action"
        );

        let measured = self.scale_and_measure(previous).await?;
        let sample = measured.sample;

        let breakdown = self.reward.compute(&RewardInputs {
            cpu_usage: sample.cpu_usage,
            memory_usage: sample.memory_usage,
            response_time_ms: sample.response_time_ms,
            replica_state: self.replica_state,
        });

        self.iteration = self.iteration.saturating_sub(1);
        let terminated = self.iteration == 0;

        let observation = self.observation(&sample);
        let info = StepInfo {
            iteration: self.iteration,
            action,
            reward: breakdown.reward,
            terminated,
            replica_state: self.replica_state,
            ready_replicas: measured.readiness.ready_count,
            cpu_usage: observation.cpu_usage,
            memory_usage: observation.memory_usage,
            response_time: observation.response_time,
            response_time_ms: sample.response_time_ms,
            last_action: action,
        };

        info!(
            workload = %self.settings.workload,
            action,
            replicas = self.replica_state,
            ready = measured.readiness.ready_count,
            cpu = sample.cpu_usage,
            memory = sample.memory_usage,
            response_time_ms = sample.response_time_ms,
            reward = breakdown.reward,
            iteration = self.iteration,
            "step complete"
        );
        self.record(&info);

        Ok(Transition {
            observation,
            reward: breakdown.reward,
            terminated,
            info,
        })
    }

    /// Actuate the current replica state, wait for convergence, then sample
    /// metrics. A scale-up additionally waits `wait_time` for warm-up.
    async fn scale_and_measure(&self, previous: u32) -> EnvResult<Measured> {
        let workload = &self.settings.workload;
        let target = self.replica_state;

        let outcome = scale_with_retry(&self.backend, workload, target, &self.retry).await;
        if let ScaleOutcome::Scaled { attempts } = outcome {
            if attempts > 1 {
                info!(workload = %workload, replicas = target, attempts, "scaled after retries");
            }
        }

        let readiness = self
            .backend
            .await_ready(workload, target, self.settings.timeout, self.settings.poll_interval)
            .await;
        if !readiness.ready {
            warn!(
                workload = %workload,
                ready = readiness.ready_count,
                desired = readiness.desired,
                timeout_ms = self.settings.timeout.as_millis() as u64,
                "replicas not ready within timeout"
            );
        }

        if target > previous {
            debug!(
                workload = %workload,
                wait_ms = self.settings.wait_time.as_millis() as u64,
                "waiting for new replicas to warm up"
            );
            tokio::time::sleep(self.settings.wait_time).await;
        }

        let query = MetricsQuery {
            replicas_expected: readiness.ready_count,
            interval: self.settings.metrics_interval,
            quantile: self.settings.metrics_quantile,
            timeout: self.settings.timeout,
        };
        let collect = async {
            loop {
                match self.backend.sample(workload, query).await {
                    Err(BackendError::Unavailable(reason)) => {
                        warn!(workload = %workload, reason = %reason, "metrics unavailable, retrying");
                        tokio::time::sleep(self.settings.poll_interval).await;
                    }
                    result => return result,
                }
            }
        };
        let sample = match tokio::time::timeout(self.settings.timeout, collect).await {
            Ok(Ok(sample)) => sample,
            Ok(Err(e)) => return Err(EnvError::Metrics(e)),
            Err(_) => {
                warn!(
                    workload = %workload,
                    timeout_ms = self.settings.timeout.as_millis() as u64,
                    "metrics collection timed out, using empty sample"
                );
                MetricsSample::empty()
            }
        };
        if sample.collected < readiness.ready_count {
            debug!(
                workload = %workload,
                collected = sample.collected,
                expected = readiness.ready_count,
                "partial metrics sample"
            );
        }

        Ok(Measured { readiness, sample })
    }

    fn observation(&self, sample: &MetricsSample) -> Observation {
        Observation {
            cpu_usage: sample.cpu_usage,
            memory_usage: sample.memory_usage,
            response_time: normalize_response_time(
                sample.response_time_ms,
                self.settings.max_response_time,
            ),
            last_action: self.last_action,
        }
    }

    fn record(&self, info: &StepInfo) {
        let mut point = Point::from_step(&self.settings.measurement, &self.settings.workload, info);
        for (k, v) in &self.tags {
            point = point.tag(k.as_str(), v.as_str());
        }
        self.telemetry.write_point(&point);
    }
}

struct Measured {
    readiness: Readiness,
    sample: MetricsSample,
}

/// Response time as a percentage of the SLA, capped at 100. NaN passes
/// through.
pub fn normalize_response_time(response_time_ms: f64, max_response_time: f64) -> f64 {
    if response_time_ms.is_nan() {
        return f64::NAN;
    }
    (response_time_ms / max_response_time * 100.0).min(100.0)
}
