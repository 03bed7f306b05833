//! Three-point fuzzy override on top of tabular Q-learning.
//!
//! With probability `fuzzy_weight` the fuzzy recommendation picks the
//! action outright (lowest, middle or highest index). Otherwise the inner
//! Q-learning policy decides. Learning is delegated unchanged.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rlscale_core::Observation;
use rlscale_fuzzy::{FuzzyEngine, Recommendation};

use crate::error::PolicyResult;
use crate::learner::{Hyperparameters, QLearner};
use crate::tabular::{QLearningPolicy, TabularKey};

#[derive(Debug, Clone)]
pub struct FuzzyOverridePolicy {
    inner: QLearningPolicy,
    engine: FuzzyEngine,
    fuzzy_weight: f64,
    rng: StdRng,
}

impl FuzzyOverridePolicy {
    pub fn new(
        n_actions: usize,
        params: Hyperparameters,
        created_at: u64,
        engine: FuzzyEngine,
        fuzzy_weight: f64,
        mut rng: StdRng,
    ) -> Self {
        let inner_rng = StdRng::from_rng(&mut rng);
        Self {
            inner: QLearningPolicy::new(n_actions, params, created_at, inner_rng),
            engine,
            fuzzy_weight,
            rng,
        }
    }

    pub fn state_key(&self, observation: &Observation) -> TabularKey {
        self.inner.state_key(observation)
    }

    pub fn get_action(&mut self, observation: &Observation) -> usize {
        if self.rng.random::<f64>() < self.fuzzy_weight {
            let decision = self.engine.decide(observation);
            return anchor_action(decision.recommendation, self.inner.learner().n_actions());
        }
        self.inner.get_action(observation)
    }

    pub fn update(
        &mut self,
        observation: &Observation,
        action: usize,
        reward: f64,
        next_observation: &Observation,
    ) -> PolicyResult<()> {
        self.inner
            .update(observation, action, reward, next_observation)
    }

    pub fn learner(&self) -> &QLearner<TabularKey> {
        self.inner.learner()
    }

    pub fn learner_mut(&mut self) -> &mut QLearner<TabularKey> {
        self.inner.learner_mut()
    }
}

fn anchor_action(recommendation: Recommendation, n_actions: usize) -> usize {
    let last = n_actions.saturating_sub(1);
    match recommendation {
        Recommendation::ScaleUp => last,
        Recommendation::ScaleDown => 0,
        Recommendation::Maintain => last / 2,
    }
}
