//! The closed set of policy variants behind one interface.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use rlscale_core::Observation;
use rlscale_core::config::{AgentConfig, Algorithm, FuzzyConfig};
use rlscale_fuzzy::{FuzzyEngine, FuzzyStateKey};

use crate::error::PolicyResult;
use crate::fuzzy_override::FuzzyOverridePolicy;
use crate::hybrid::FuzzyHybridPolicy;
use crate::learner::{Hyperparameters, QLearner};
use crate::table::{StateKey, argmax, max_value};
use crate::tabular::{QLearningPolicy, TabularKey, exploration_rng};

/// Run `$body` against the variant's learner, whatever its key type.
macro_rules! with_learner {
    ($policy:expr, $l:ident => $body:expr) => {
        match $policy {
            Policy::QLearning(p) => {
                let $l = p.learner();
                $body
            }
            Policy::FuzzyHybrid(p) => {
                let $l = p.learner();
                $body
            }
            Policy::FuzzyOverride(p) => {
                let $l = p.learner();
                $body
            }
        }
    };
}

macro_rules! with_learner_mut {
    ($policy:expr, $l:ident => $body:expr) => {
        match $policy {
            Policy::QLearning(p) => {
                let $l = p.learner_mut();
                $body
            }
            Policy::FuzzyHybrid(p) => {
                let $l = p.learner_mut();
                $body
            }
            Policy::FuzzyOverride(p) => {
                let $l = p.learner_mut();
                $body
            }
        }
    };
}

/// State key of whichever variant produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PolicyStateKey {
    Tabular(TabularKey),
    Fuzzy(FuzzyStateKey),
}

#[derive(Debug, Clone)]
pub enum Policy {
    QLearning(QLearningPolicy),
    FuzzyHybrid(FuzzyHybridPolicy),
    FuzzyOverride(FuzzyOverridePolicy),
}

impl Policy {
    /// Build the variant named by `config.algorithm`.
    pub fn from_config(
        config: &AgentConfig,
        fuzzy: Option<&FuzzyConfig>,
        created_at: u64,
    ) -> PolicyResult<Self> {
        let params = Hyperparameters::from_config(config);
        let rng = exploration_rng(config.seed);
        let policy = match config.algorithm {
            Algorithm::QLearning => {
                Self::QLearning(QLearningPolicy::new(config.n_actions, params, created_at, rng))
            }
            Algorithm::FuzzyHybrid => Self::FuzzyHybrid(FuzzyHybridPolicy::new(
                config.n_actions,
                params,
                created_at,
                FuzzyEngine::from_config(fuzzy)?,
                config.fuzzy_weight,
                config.fuzziness_bandwidth,
                rng,
            )),
            Algorithm::FuzzyOverride => Self::FuzzyOverride(FuzzyOverridePolicy::new(
                config.n_actions,
                params,
                created_at,
                FuzzyEngine::from_config(fuzzy)?,
                config.fuzzy_weight,
                rng,
            )),
        };

        info!(
            algorithm = %config.algorithm,
            n_actions = config.n_actions,
            learning_rate = params.learning_rate,
            discount_factor = params.discount_factor,
            epsilon = params.epsilon,
            epsilon_decay = params.epsilon_decay,
            epsilon_min = params.epsilon_min,
            "policy initialized"
        );
        Ok(policy)
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::QLearning(_) => Algorithm::QLearning,
            Self::FuzzyHybrid(_) => Algorithm::FuzzyHybrid,
            Self::FuzzyOverride(_) => Algorithm::FuzzyOverride,
        }
    }

    pub fn state_key(&self, observation: &Observation) -> PolicyStateKey {
        match self {
            Self::QLearning(p) => PolicyStateKey::Tabular(p.state_key(observation)),
            Self::FuzzyHybrid(p) => PolicyStateKey::Fuzzy(p.state_key(observation)),
            Self::FuzzyOverride(p) => PolicyStateKey::Tabular(p.state_key(observation)),
        }
    }

    pub fn get_action(&mut self, observation: &Observation) -> usize {
        match self {
            Self::QLearning(p) => p.get_action(observation),
            Self::FuzzyHybrid(p) => p.get_action(observation),
            Self::FuzzyOverride(p) => p.get_action(observation),
        }
    }

    pub fn update(
        &mut self,
        observation: &Observation,
        action: usize,
        reward: f64,
        next_observation: &Observation,
    ) -> PolicyResult<()> {
        match self {
            Self::QLearning(p) => p.update(observation, action, reward, next_observation),
            Self::FuzzyHybrid(p) => p.update(observation, action, reward, next_observation),
            Self::FuzzyOverride(p) => p.update(observation, action, reward, next_observation),
        }
    }

    pub fn params(&self) -> Hyperparameters {
        with_learner!(self, l => *l.params())
    }

    pub fn epsilon(&self) -> f64 {
        self.params().epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        with_learner_mut!(self, l => l.params_mut().epsilon = epsilon)
    }

    pub fn set_epsilon_decay(&mut self, decay: f64) {
        with_learner_mut!(self, l => l.params_mut().epsilon_decay = decay)
    }

    pub fn n_actions(&self) -> usize {
        with_learner!(self, l => l.n_actions())
    }

    pub fn table_len(&self) -> usize {
        with_learner!(self, l => l.table().len())
    }

    pub fn episodes_trained(&self) -> u64 {
        with_learner!(self, l => l.episodes_trained())
    }

    pub fn add_episode_count(&mut self, count: u64) {
        with_learner_mut!(self, l => l.add_episode_count(count))
    }

    /// Persist the table and hyperparameters atomically.
    pub fn save(&self, path: &Path, episodes_trained: u64) -> PolicyResult<()> {
        with_learner!(self, l => l.save(path, episodes_trained))
    }

    /// Replace the table and hyperparameters from `path`.
    pub fn load(&mut self, path: &Path) -> PolicyResult<()> {
        with_learner_mut!(self, l => l.load(path))
    }

    /// Every row's state and action values, in key order.
    pub fn q_values(&self) -> Vec<(PolicyStateKey, Vec<f64>)> {
        match self {
            Self::QLearning(p) => rows_of(p.learner(), PolicyStateKey::Tabular),
            Self::FuzzyHybrid(p) => rows_of(p.learner(), PolicyStateKey::Fuzzy),
            Self::FuzzyOverride(p) => rows_of(p.learner(), PolicyStateKey::Tabular),
        }
    }

    /// Table size plus best action and value for the first `max_states`
    /// states in key order.
    pub fn summary(&self, max_states: usize) -> PolicySummary {
        let params = self.params();
        let (states, rows) = with_learner!(self, l => (l.table().len(), summarize(l, max_states)));
        PolicySummary {
            algorithm: self.algorithm(),
            states,
            n_actions: self.n_actions(),
            epsilon: params.epsilon,
            episodes_trained: self.episodes_trained(),
            rows,
        }
    }
}

fn rows_of<K: StateKey>(
    learner: &QLearner<K>,
    wrap: fn(K) -> PolicyStateKey,
) -> Vec<(PolicyStateKey, Vec<f64>)> {
    learner
        .table()
        .sorted_rows()
        .into_iter()
        .map(|(state, values)| (wrap(state.clone()), values.to_vec()))
        .collect()
}

fn summarize<K: StateKey>(learner: &QLearner<K>, max_states: usize) -> Vec<StateSummary> {
    learner
        .table()
        .sorted_rows()
        .into_iter()
        .take(max_states)
        .map(|(state, values)| StateSummary {
            state: serde_json::to_string(state).unwrap_or_default(),
            best_action: argmax(values),
            max_q: max_value(values),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state: String,
    pub best_action: usize,
    pub max_q: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicySummary {
    pub algorithm: Algorithm,
    pub states: usize,
    pub n_actions: usize,
    pub epsilon: f64,
    pub episodes_trained: u64,
    pub rows: Vec<StateSummary>,
}

impl fmt::Display for PolicySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "algorithm:        {}", self.algorithm)?;
        writeln!(f, "states:           {}", self.states)?;
        writeln!(f, "actions:          {}", self.n_actions)?;
        writeln!(f, "epsilon:          {:.4}", self.epsilon)?;
        writeln!(f, "episodes trained: {}", self.episodes_trained)?;
        for row in &self.rows {
            writeln!(
                f,
                "  {}  best_action={}  max_q={:.4}",
                row.state, row.best_action, row.max_q
            )?;
        }
        Ok(())
    }
}
