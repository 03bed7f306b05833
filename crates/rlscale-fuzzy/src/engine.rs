//! Fuzzy inference engine.
//!
//! The rule base is a weighted max-of-min combination. Response-time
//! severity carries full weight; CPU and memory extremes only fire the
//! secondary rules.

use serde::{Deserialize, Serialize};

use rlscale_core::Observation;
use rlscale_core::config::FuzzyConfig;

use crate::membership::{
    FuzzyError, FuzzyStateKey, LatencyDegrees, LatencyTerms, LoadDegrees, LoadTerms,
};

/// Weight of rules driven by response time.
const LATENCY_RULE_WEIGHT: f64 = 1.0;
/// Weight of rules where CPU and memory agree.
const COMBINED_LOAD_RULE_WEIGHT: f64 = 0.8;
/// Weight of rules driven by a single resource.
const SINGLE_LOAD_RULE_WEIGHT: f64 = 0.5;

/// Influence beyond which `decide` recommends a scaling direction.
const RECOMMENDATION_THRESHOLD: f64 = 0.4;
/// How strongly "no change" mass dampens the influence.
const HYSTERESIS_DAMPING: f64 = 0.6;
const EPSILON: f64 = 1e-8;

/// Degrees per metric and label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyState {
    pub cpu_usage: LoadDegrees,
    pub memory_usage: LoadDegrees,
    pub response_time: LatencyDegrees,
}

impl FuzzyState {
    /// Dominant label per metric.
    pub fn dominant(&self) -> FuzzyStateKey {
        FuzzyStateKey {
            cpu: self.cpu_usage.dominant(),
            memory: self.memory_usage.dominant(),
            response: self.response_time.dominant(),
        }
    }
}

/// Normalized strength of each scaling direction. Sums to ~1 unless every
/// rule was silent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionMemberships {
    pub scale_up: f64,
    pub scale_down: f64,
    pub no_change: f64,
}

impl ActionMemberships {
    fn total(&self) -> f64 {
        self.scale_up + self.scale_down + self.no_change
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ScaleUp,
    ScaleDown,
    Maintain,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleUp => "scale_up",
            Self::ScaleDown => "scale_down",
            Self::Maintain => "maintain",
        }
    }
}

/// Result of a full inference pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyDecision {
    pub state: FuzzyState,
    pub memberships: ActionMemberships,
    /// Scaling pressure in `[-1, 1]`.
    pub influence: f64,
    pub recommendation: Recommendation,
}

/// Stateless inference engine holding the membership terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuzzyEngine {
    cpu: LoadTerms,
    memory: LoadTerms,
    response: LatencyTerms,
}

impl FuzzyEngine {
    pub fn new(cpu: LoadTerms, memory: LoadTerms, response: LatencyTerms) -> Self {
        Self {
            cpu,
            memory,
            response,
        }
    }

    /// Build an engine from optional overrides; absent variables keep the
    /// default terms.
    pub fn from_config(config: Option<&FuzzyConfig>) -> Result<Self, FuzzyError> {
        let mut engine = Self::default();
        let Some(config) = config else {
            return Ok(engine);
        };
        if let Some(cpu) = &config.cpu_usage {
            engine.cpu = LoadTerms::from_config(cpu)?;
        }
        if let Some(memory) = &config.memory_usage {
            engine.memory = LoadTerms::from_config(memory)?;
        }
        if let Some(response) = &config.response_time {
            engine.response = LatencyTerms::from_config(response)?;
        }
        Ok(engine)
    }

    /// Evaluate every label of every metric. Inputs are clamped to
    /// `[0, 100]`; a NaN response time reads as 0.
    pub fn fuzzify(&self, observation: &Observation) -> FuzzyState {
        FuzzyState {
            cpu_usage: self.cpu.evaluate(clamp_pct(observation.cpu_usage)),
            memory_usage: self.memory.evaluate(clamp_pct(observation.memory_usage)),
            response_time: self
                .response
                .evaluate(clamp_pct(observation.response_time_or_zero())),
        }
    }

    /// Fire the rule base and normalize the three outputs.
    pub fn apply_rules(&self, state: &FuzzyState) -> ActionMemberships {
        let cpu = &state.cpu_usage;
        let mem = &state.memory_usage;
        let resp = &state.response_time;

        let scale_up = max3(
            LATENCY_RULE_WEIGHT * resp.slow,
            COMBINED_LOAD_RULE_WEIGHT * cpu.high.min(mem.high),
            SINGLE_LOAD_RULE_WEIGHT * cpu.high.max(mem.high).min(1.0 - resp.fast),
        );
        let scale_down = max3(
            LATENCY_RULE_WEIGHT * resp.fast.min(cpu.low.max(mem.low)),
            COMBINED_LOAD_RULE_WEIGHT * cpu.low.min(mem.low).min(1.0 - resp.slow),
            SINGLE_LOAD_RULE_WEIGHT * cpu.low.max(mem.low).min(resp.normal),
        );
        let no_change = max3(
            LATENCY_RULE_WEIGHT * resp.normal,
            COMBINED_LOAD_RULE_WEIGHT * cpu.medium.min(mem.medium).min(1.0 - resp.slow),
            SINGLE_LOAD_RULE_WEIGHT * cpu.medium.max(mem.medium).min(resp.fast),
        );

        let total = scale_up + scale_down + no_change + EPSILON;
        ActionMemberships {
            scale_up: scale_up / total,
            scale_down: scale_down / total,
            no_change: no_change / total,
        }
    }

    /// Collapse action memberships into a signed influence in `[-1, 1]`.
    pub fn influence(&self, memberships: &ActionMemberships) -> f64 {
        let total = memberships.total() + EPSILON;
        let direction = (memberships.scale_up - memberships.scale_down) / total;
        let confidence = max3(
            memberships.scale_up,
            memberships.scale_down,
            memberships.no_change,
        );
        let neutrality = memberships.no_change / total;
        let hysteresis = 1.0 - HYSTERESIS_DAMPING * neutrality;
        (direction * hysteresis * confidence).clamp(-1.0, 1.0)
    }

    pub fn decide(&self, observation: &Observation) -> FuzzyDecision {
        let state = self.fuzzify(observation);
        let memberships = self.apply_rules(&state);
        let influence = self.influence(&memberships);
        let recommendation = if influence > RECOMMENDATION_THRESHOLD {
            Recommendation::ScaleUp
        } else if influence < -RECOMMENDATION_THRESHOLD {
            Recommendation::ScaleDown
        } else {
            Recommendation::Maintain
        };
        FuzzyDecision {
            state,
            memberships,
            influence,
            recommendation,
        }
    }
}

fn clamp_pct(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

fn max3(a: f64, b: f64, c: f64) -> f64 {
    a.max(b).max(c)
}
