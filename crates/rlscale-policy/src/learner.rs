//! Q-learning core shared by every policy variant: temporal-difference
//! update, epsilon schedule, episode counter, and checkpoint mapping.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use rlscale_core::config::AgentConfig;

use crate::checkpoint::{Checkpoint, QEntry};
use crate::error::{PolicyError, PolicyResult};
use crate::table::{QTable, StateKey, max_value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Step size α in (0, 1].
    pub learning_rate: f64,
    /// Discount γ in [0, 1].
    pub discount_factor: f64,
    /// Current exploration rate.
    pub epsilon: f64,
    pub epsilon_min: f64,
    /// Multiplicative decay applied after every update.
    pub epsilon_decay: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.1,
            epsilon_min: 0.01,
            epsilon_decay: 0.99,
        }
    }
}

impl Hyperparameters {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon: config.epsilon_start,
            epsilon_min: config.epsilon_min,
            epsilon_decay: config.epsilon_decay,
        }
    }
}

/// Value table plus the learning state that travels with it.
#[derive(Debug, Clone)]
pub struct QLearner<K> {
    table: QTable<K>,
    params: Hyperparameters,
    created_at: u64,
    episodes_trained: u64,
}

impl<K: StateKey> QLearner<K> {
    pub fn new(n_actions: usize, params: Hyperparameters, created_at: u64) -> Self {
        Self {
            table: QTable::new(n_actions),
            params,
            created_at,
            episodes_trained: 0,
        }
    }

    pub fn table(&self) -> &QTable<K> {
        &self.table
    }

    pub fn n_actions(&self) -> usize {
        self.table.n_actions()
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Hyperparameters {
        &mut self.params
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn episodes_trained(&self) -> u64 {
        self.episodes_trained
    }

    pub fn add_episode_count(&mut self, count: u64) {
        self.episodes_trained += count;
    }

    /// Action values for `state`, zero-initialized on first sight.
    pub fn row_mut(&mut self, state: &K) -> &mut Vec<f64> {
        self.table.row_mut(state)
    }

    /// `Q[s][a] += α · (r + γ · max Q[s'] − Q[s][a])`, then decay epsilon.
    ///
    /// Returns the updated value.
    pub fn update(&mut self, state: &K, action: usize, reward: f64, next: &K) -> PolicyResult<f64> {
        let n_actions = self.table.n_actions();
        if action >= n_actions {
            return Err(PolicyError::ActionOutOfRange { action, n_actions });
        }

        self.table.row_mut(state);
        let best_next = max_value(self.table.row_mut(next));

        let Hyperparameters {
            learning_rate,
            discount_factor,
            ..
        } = self.params;
        let q = &mut self.table.row_mut(state)[action];
        *q += learning_rate * (reward + discount_factor * best_next - *q);
        let updated = *q;

        self.decay_epsilon();
        Ok(updated)
    }

    fn decay_epsilon(&mut self) {
        let p = &mut self.params;
        if p.epsilon > p.epsilon_min {
            p.epsilon = p.epsilon_min.max(p.epsilon * p.epsilon_decay);
        }
    }

    pub fn to_checkpoint(&self, episodes_trained: u64) -> Checkpoint<K> {
        Checkpoint {
            q_table: self
                .table
                .sorted_rows()
                .into_iter()
                .map(|(state, values)| QEntry {
                    state: state.clone(),
                    values: values.to_vec(),
                })
                .collect(),
            learning_rate: self.params.learning_rate,
            discount_factor: self.params.discount_factor,
            epsilon: self.params.epsilon,
            epsilon_min: self.params.epsilon_min,
            epsilon_decay: self.params.epsilon_decay,
            n_actions: self.table.n_actions(),
            created_at: self.created_at,
            episodes_trained,
        }
    }

    /// Replace the table and hyperparameters with a checkpoint's contents.
    pub fn restore(&mut self, checkpoint: Checkpoint<K>) {
        self.params = Hyperparameters {
            learning_rate: checkpoint.learning_rate,
            discount_factor: checkpoint.discount_factor,
            epsilon: checkpoint.epsilon,
            epsilon_min: checkpoint.epsilon_min,
            epsilon_decay: checkpoint.epsilon_decay,
        };
        self.created_at = checkpoint.created_at;
        self.episodes_trained = checkpoint.episodes_trained;
        self.table = QTable::from_rows(
            checkpoint.n_actions,
            checkpoint.q_table.into_iter().map(|e| (e.state, e.values)),
        );
    }

    pub fn save(&self, path: &Path, episodes_trained: u64) -> PolicyResult<()> {
        self.to_checkpoint(episodes_trained).save(path)?;
        info!(path = %path.display(), states = self.table.len(), "model saved");
        Ok(())
    }

    pub fn load(&mut self, path: &Path) -> PolicyResult<()> {
        let checkpoint = Checkpoint::load(path)?;
        self.restore(checkpoint);
        info!(
            path = %path.display(),
            states = self.table.len(),
            episodes_trained = self.episodes_trained,
            "model loaded"
        );
        Ok(())
    }
}
