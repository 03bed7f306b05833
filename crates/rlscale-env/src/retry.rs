//! Scale requests with bounded retries and exponential backoff.
//!
//! Attempt `n` (1-based) gets a per-attempt timeout of
//! `min(base_timeout · 1.5^(n−1), max_timeout)`; a failed attempt is
//! followed by a delay of `min(base_delay · 2^(n−1), max_delay)`. No
//! delay follows the final attempt.

use std::time::Duration;

use tracing::{debug, error, warn};

use rlscale_core::config::ScalingConfig;
use rlscale_core::{ConfigResult, WorkloadRef};

use crate::backend::Actuator;
use crate::error::ScaleError;

const TIMEOUT_GROWTH: f64 = 1.5;
const DELAY_GROWTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_timeout: Duration,
    pub max_timeout: Duration,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ScalingConfig) -> ConfigResult<Self> {
        Ok(Self {
            max_attempts: config.max_scaling_retries,
            base_timeout: config.base_timeout()?,
            max_timeout: config.max_timeout()?,
            base_delay: config.base_delay()?,
            max_delay: config.max_delay()?,
        })
    }

    /// Per-attempt timeout for 1-based `attempt`.
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        grow(self.base_timeout, TIMEOUT_GROWTH, attempt, self.max_timeout)
    }

    /// Delay after failed 1-based `attempt`.
    pub fn attempt_delay(&self, attempt: u32) -> Duration {
        grow(self.base_delay, DELAY_GROWTH, attempt, self.max_delay)
    }
}

fn grow(base: Duration, factor: f64, attempt: u32, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(1023) as i32;
    let secs = base.as_secs_f64() * factor.powi(exponent);
    if secs >= cap.as_secs_f64() {
        cap
    } else {
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleOutcome {
    Scaled { attempts: u32 },
    /// Every attempt failed; the caller proceeds anyway.
    Exhausted {
        attempts: u32,
        last_error: Option<ScaleError>,
    },
}

impl ScaleOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Scaled { attempts } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_scaled(&self) -> bool {
        matches!(self, Self::Scaled { .. })
    }
}

/// Request `replicas` for `workload`, retrying every failure kind until the
/// budget is spent. Exhaustion is logged at critical severity, not
/// returned as an error.
pub async fn scale_with_retry<A: Actuator>(
    actuator: &A,
    workload: &WorkloadRef,
    replicas: u32,
    policy: &RetryPolicy,
) -> ScaleOutcome {
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        let timeout = policy.attempt_timeout(attempt);
        let err = match tokio::time::timeout(timeout, actuator.scale(workload, replicas, timeout)).await
        {
            Ok(Ok(())) => {
                debug!(workload = %workload, replicas, attempt, "scale request accepted");
                return ScaleOutcome::Scaled { attempts: attempt };
            }
            Ok(Err(e)) => e,
            Err(_) => ScaleError::TransientServer(format!(
                "no response within {}ms",
                timeout.as_millis()
            )),
        };

        let exhausted = attempt == policy.max_attempts;
        let delay = policy.attempt_delay(attempt);
        warn!(
            workload = %workload,
            replicas,
            attempt,
            max_attempts = policy.max_attempts,
            timeout_ms = timeout.as_millis() as u64,
            delay_ms = if exhausted { 0 } else { delay.as_millis() as u64 },
            error = %err,
            "scale request failed"
        );
        last_error = Some(err);
        if !exhausted {
            tokio::time::sleep(delay).await;
        }
    }

    error!(
        severity = "critical",
        workload = %workload,
        replicas,
        attempts = policy.max_attempts,
        error = last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
        "scaling retries exhausted, continuing without confirmation"
    );
    ScaleOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error,
    }
}
