//! Step reward: one minus latency, resource and cost penalties, clamped to
//! `[-1, 1]`.
//!
//! ```text
//! resp_pct    = response_ms / max_response_time · 100
//! resp_pen    = 0                                  if resp_pct ≤ 100
//!             = min(w_resp, (resp_pct − 100) / 100) otherwise
//! cpu_pen     = distance outside [min_cpu, max_cpu], scaled by the gap
//!               to the nearer edge of [0, 100]
//! cpu_mem_pen = w_res · (cpu_pen + mem_pen)
//! cost_pen    = w_cost · cost_factor · replica_ratio
//! ```
//!
//! `cost_factor` eases cost pressure while the SLA is breached and many
//! replicas are already running, and sharpens it when few are.

use serde::Serialize;

use rlscale_core::config::{BoundsConfig, RewardConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardInputs {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Raw response time in milliseconds; NaN counts as no latency.
    pub response_time_ms: f64,
    pub replica_state: u32,
}

/// Penalty terms behind a reward, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub response_penalty: f64,
    pub cpu_memory_penalty: f64,
    pub cost_penalty: f64,
    pub cost_factor: f64,
    pub reward: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardModel {
    bounds: BoundsConfig,
    weights: RewardConfig,
    min_replicas: u32,
    max_replicas: u32,
}

impl RewardModel {
    pub fn new(
        bounds: BoundsConfig,
        weights: RewardConfig,
        min_replicas: u32,
        max_replicas: u32,
    ) -> Self {
        Self {
            bounds,
            weights,
            min_replicas,
            max_replicas,
        }
    }

    /// Response time as a percentage of the SLA (uncapped).
    pub fn response_pct(&self, response_time_ms: f64) -> f64 {
        if response_time_ms.is_nan() {
            return 0.0;
        }
        response_time_ms / self.bounds.max_response_time * 100.0
    }

    pub fn compute(&self, inputs: &RewardInputs) -> RewardBreakdown {
        let w = &self.weights;
        let resp_pct = self.response_pct(inputs.response_time_ms);
        let sla_breached = resp_pct > 100.0;

        let response_penalty = if sla_breached {
            w.response_time_weight.min((resp_pct - 100.0) / 100.0)
        } else {
            0.0
        };

        let cpu_penalty = band_penalty(inputs.cpu_usage, self.bounds.min_cpu, self.bounds.max_cpu);
        let memory_penalty = band_penalty(
            inputs.memory_usage,
            self.bounds.min_memory,
            self.bounds.max_memory,
        );
        let cpu_memory_penalty = w.cpu_memory_weight * (cpu_penalty + memory_penalty);

        let span = self.max_replicas.saturating_sub(self.min_replicas).max(1) as f64;
        let replica_ratio = inputs.replica_state.saturating_sub(self.min_replicas) as f64 / span;
        let cost_factor = if sla_breached && replica_ratio > w.cost_relief_ratio {
            w.cost_relief_factor
        } else if sla_breached && replica_ratio < w.cost_pressure_ratio {
            w.cost_pressure_factor
        } else {
            1.0
        };
        let cost_penalty = w.cost_weight * cost_factor * replica_ratio;

        let reward =
            (1.0 - response_penalty - cpu_memory_penalty - cost_penalty).clamp(-1.0, 1.0);
        RewardBreakdown {
            response_penalty,
            cpu_memory_penalty,
            cost_penalty,
            cost_factor,
            reward,
        }
    }

    pub fn reward(&self, inputs: &RewardInputs) -> f64 {
        self.compute(inputs).reward
    }
}

/// Relative distance of `value` outside `[min, max]`.
fn band_penalty(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        (min - value) / min
    } else if value > max {
        (value - max) / (100.0 - max)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> RewardModel {
        RewardModel::new(BoundsConfig::default(), RewardConfig::default(), 1, 10)
    }

    fn inputs(cpu: f64, mem: f64, resp_ms: f64, replicas: u32) -> RewardInputs {
        RewardInputs {
            cpu_usage: cpu,
            memory_usage: mem,
            response_time_ms: resp_ms,
            replica_state: replicas,
        }
    }

    #[test]
    fn cpu_over_bound_at_min_replicas() {
        let r = model().reward(&inputs(95.0, 50.0, 50.0, 1));
        assert!((r - 0.75).abs() < 1e-12, "reward {r}");
    }

    #[test]
    fn perfect_state_earns_full_reward() {
        assert_eq!(model().reward(&inputs(50.0, 50.0, 40.0, 1)), 1.0);
    }

    #[test]
    fn cpu_under_bound_is_penalized_relative_to_min() {
        let b = model().compute(&inputs(5.0, 50.0, 10.0, 1));
        // (10 - 5) / 10 · 0.5
        assert!((b.cpu_memory_penalty - 0.25).abs() < 1e-12);
    }

    #[test]
    fn cost_factor_branches() {
        let m = model();
        // SLA breached, replica ratio 8/9 > 0.6.
        let relief = m.compute(&inputs(50.0, 50.0, 150.0, 9));
        assert_eq!(relief.cost_factor, 0.5);
        // SLA breached, replica ratio 1/9 < 0.3.
        let pressure = m.compute(&inputs(50.0, 50.0, 150.0, 2));
        assert_eq!(pressure.cost_factor, 1.5);
        // SLA breached, ratio in between.
        let neutral = m.compute(&inputs(50.0, 50.0, 150.0, 5));
        assert_eq!(neutral.cost_factor, 1.0);
        // SLA met, high ratio.
        let met = m.compute(&inputs(50.0, 50.0, 50.0, 10));
        assert_eq!(met.cost_factor, 1.0);
        assert!((met.cost_penalty - 0.3).abs() < 1e-12);
    }

    #[test]
    fn response_penalty_is_capped_by_weight() {
        let b = model().compute(&inputs(50.0, 50.0, 10_000.0, 1));
        assert_eq!(b.response_penalty, 1.0);
        let b = model().compute(&inputs(50.0, 50.0, 150.0, 1));
        assert!((b.response_penalty - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nan_latency_is_not_a_breach() {
        let b = model().compute(&inputs(50.0, 50.0, f64::NAN, 1));
        assert_eq!(b.response_penalty, 0.0);
        assert_eq!(b.reward, 1.0);
    }

    #[test]
    fn reward_is_bounded() {
        let m = model();
        for cpu in [0.0, 5.0, 50.0, 90.0, 99.0, 100.0] {
            for mem in [0.0, 9.0, 60.0, 95.0, 100.0] {
                for resp in [0.0, 80.0, 120.0, 250.0, 1e6] {
                    for replicas in 1..=10 {
                        let r = m.reward(&inputs(cpu, mem, resp, replicas));
                        assert!((-1.0..=1.0).contains(&r), "reward {r}");
                    }
                }
            }
        }
        assert_eq!(m.reward(&inputs(0.0, 100.0, 1e6, 2)), -1.0);
    }

    #[test]
    fn single_replica_range_does_not_divide_by_zero() {
        let m = RewardModel::new(BoundsConfig::default(), RewardConfig::default(), 3, 3);
        let b = m.compute(&inputs(50.0, 50.0, 50.0, 3));
        assert_eq!(b.cost_penalty, 0.0);
    }
}
