//! Tabular Q-learning over integer-discretized observations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use rlscale_core::Observation;

use crate::error::PolicyResult;
use crate::learner::{Hyperparameters, QLearner};
use crate::table::argmax;

/// `(floor(cpu), floor(memory), floor(response time or 0), last_action)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabularKey {
    pub cpu: i64,
    pub memory: i64,
    pub response_time: i64,
    pub last_action: usize,
}

impl TabularKey {
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            cpu: observation.cpu_usage.floor() as i64,
            memory: observation.memory_usage.floor() as i64,
            response_time: observation.response_time_or_zero().floor() as i64,
            last_action: observation.last_action,
        }
    }
}

/// Build the exploration RNG: seeded when a seed is configured.
pub fn exploration_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Epsilon-greedy tabular Q-learning.
#[derive(Debug, Clone)]
pub struct QLearningPolicy {
    learner: QLearner<TabularKey>,
    rng: StdRng,
}

impl QLearningPolicy {
    pub fn new(n_actions: usize, params: Hyperparameters, created_at: u64, rng: StdRng) -> Self {
        Self {
            learner: QLearner::new(n_actions, params, created_at),
            rng,
        }
    }

    pub fn state_key(&self, observation: &Observation) -> TabularKey {
        TabularKey::from_observation(observation)
    }

    /// With probability ε a uniform random action, otherwise the greedy one.
    pub fn get_action(&mut self, observation: &Observation) -> usize {
        let key = self.state_key(observation);
        let epsilon = self.learner.params().epsilon;
        let n_actions = self.learner.n_actions();
        let row = self.learner.row_mut(&key);

        if self.rng.random::<f64>() < epsilon {
            self.rng.random_range(0..n_actions)
        } else {
            argmax(row)
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

    pub fn learner(&self) -> &QLearner<TabularKey> {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut QLearner<TabularKey> {
        &mut self.learner
    }
}
