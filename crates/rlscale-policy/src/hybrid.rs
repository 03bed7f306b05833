//! Fuzzy/Q hybrid policy.
//!
//! The Q-table is keyed by the dominant fuzzy label of each metric. Action
//! selection blends a min-max normalized Q distribution with a Gaussian
//! preference centered where the fuzzy influence points:
//!
//! ```text
//! center   = (influence + 1) / 2 · (n − 1)
//! fuzzy[i] ∝ exp(−(i − center)² / 2σ²)
//! combined = (1 − w) · q + w · fuzzy
//! ```
//!
//! Exploration samples from `combined`; exploitation takes its argmax.

use rand::Rng;
use rand::rngs::StdRng;

use rlscale_core::Observation;
use rlscale_fuzzy::{FuzzyEngine, FuzzyStateKey};

use crate::error::PolicyResult;
use crate::learner::{Hyperparameters, QLearner};
use crate::table::argmax;

/// Q spreads narrower than this are treated as flat.
const FLAT_SPREAD: f64 = 1e-8;
const NORMALIZE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct FuzzyHybridPolicy {
    learner: QLearner<FuzzyStateKey>,
    engine: FuzzyEngine,
    fuzzy_weight: f64,
    bandwidth: f64,
    rng: StdRng,
}

impl FuzzyHybridPolicy {
    pub fn new(
        n_actions: usize,
        params: Hyperparameters,
        created_at: u64,
        engine: FuzzyEngine,
        fuzzy_weight: f64,
        bandwidth: f64,
        rng: StdRng,
    ) -> Self {
        Self {
            learner: QLearner::new(n_actions, params, created_at),
            engine,
            fuzzy_weight,
            bandwidth,
            rng,
        }
    }

    pub fn state_key(&self, observation: &Observation) -> FuzzyStateKey {
        self.engine.fuzzify(observation).dominant()
    }

    /// Blended action distribution for `observation`. Creates the state row
    /// on first sight.
    pub fn action_distribution(&mut self, observation: &Observation) -> Vec<f64> {
        let decision = self.engine.decide(observation);
        let key = decision.state.dominant();
        let n_actions = self.learner.n_actions();

        let q = normalize_q(self.learner.row_mut(&key));
        let fuzzy = gaussian_preference(decision.influence, n_actions, self.bandwidth);

        let w = self.fuzzy_weight;
        let mut combined: Vec<f64> = q
            .iter()
            .zip(&fuzzy)
            .map(|(q, f)| (1.0 - w) * q + w * f)
            .collect();
        let total: f64 = combined.iter().sum::<f64>() + NORMALIZE_EPSILON;
        for p in &mut combined {
            *p /= total;
        }
        combined
    }

    pub fn get_action(&mut self, observation: &Observation) -> usize {
        let combined = self.action_distribution(observation);
        if self.rng.random::<f64>() < self.learner.params().epsilon {
            sample(&combined, &mut self.rng)
        } else {
            argmax(&combined)
        }
    }

    pub fn update(
        &mut self,
        observation: &Observation,
        action: usize,
        reward: f64,
        next_observation: &Observation,
    ) -> PolicyResult<()> {
        let state = self.state_key(observation);
        let next = self.state_key(next_observation);
        self.learner.update(&state, action, reward, &next)?;
        Ok(())
    }

    pub fn learner(&self) -> &QLearner<FuzzyStateKey> {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut QLearner<FuzzyStateKey> {
        &mut self.learner
    }
}

/// Min-max normalize to a distribution; uniform when the row is flat.
pub(crate) fn normalize_q(values: &[f64]) -> Vec<f64> {
    let n = values.len().max(1) as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    if spread.is_nan() || spread < FLAT_SPREAD {
        return vec![1.0 / n; values.len()];
    }
    let scaled: Vec<f64> = values.iter().map(|v| (v - min) / spread).collect();
    let total: f64 = scaled.iter().sum::<f64>() + NORMALIZE_EPSILON;
    scaled.into_iter().map(|v| v / total).collect()
}

/// Gaussian bump over action indices centered on the influence.
pub(crate) fn gaussian_preference(influence: f64, n_actions: usize, bandwidth: f64) -> Vec<f64> {
    let last = n_actions.saturating_sub(1) as f64;
    let center = (influence + 1.0) / 2.0 * last;
    let denom = 2.0 * bandwidth * bandwidth;
    let raw: Vec<f64> = (0..n_actions)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let total: f64 = raw.iter().sum::<f64>() + NORMALIZE_EPSILON;
    raw.into_iter().map(|v| v / total).collect()
}

/// Draw an index from a (near-)normalized distribution by inverting its CDF.
fn sample(distribution: &[f64], rng: &mut StdRng) -> usize {
    let total: f64 = distribution.iter().sum();
    let target = rng.random::<f64>() * total;
    let mut acc = 0.0;
    for (i, p) in distribution.iter().enumerate() {
        acc += p;
        if target < acc {
            return i;
        }
    }
    distribution.len().saturating_sub(1)
}
