//! Episode loop.
//!
//! `Trainer` owns one environment and one policy and alternates between
//! them: reset, then `get_action → step → update` until the environment
//! reports a terminal step. Every step is raced against the shutdown
//! channel, so an interrupt drops the in-flight step and checkpoints the
//! table as it stands.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rlscale_core::config::TrainingConfig;
use rlscale_core::{ControllerConfig, Observation};
use rlscale_env::{ClusterBackend, Environment};
use rlscale_policy::Policy;

use crate::error::{TrainError, TrainResult};
use crate::layout::RunLayout;

/// Result of one completed episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeReport {
    /// Zero-based index within the run.
    pub episode: u32,
    pub total_reward: f64,
    pub steps: u32,
    pub final_replicas: u32,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainingReport {
    pub episodes_completed: u32,
    pub returns: Vec<f64>,
    pub best_total: Option<f64>,
    pub best_checkpoint: Option<PathBuf>,
    pub final_checkpoint: Option<PathBuf>,
    pub interrupted_checkpoint: Option<PathBuf>,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub episodes: Vec<EpisodeReport>,
    pub mean_return: Option<f64>,
    pub interrupted: bool,
}

enum EpisodeOutcome {
    Completed(EpisodeReport),
    Interrupted,
}

pub struct Trainer<B> {
    env: Environment<B>,
    policy: Policy,
    training: TrainingConfig,
    epsilon_start: f64,
    layout: RunLayout,
    shutdown: watch::Receiver<bool>,
}

impl<B: ClusterBackend> Trainer<B> {
    pub fn new(
        env: Environment<B>,
        policy: Policy,
        training: TrainingConfig,
        epsilon_start: f64,
        layout: RunLayout,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            env,
            policy,
            training,
            epsilon_start,
            layout,
            shutdown,
        }
    }

    /// Build a trainer around `env`, creating the policy from `config` and
    /// resuming from `training.resume_path` when one is set.
    pub fn from_config(
        env: Environment<B>,
        config: &ControllerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> TrainResult<Self> {
        config.validate()?;
        let start_time = epoch_secs();
        let policy = Policy::from_config(&config.agent, config.fuzzy.as_ref(), start_time)?;
        let layout = RunLayout::new(
            &config.training.checkpoint_dir,
            config.agent.algorithm,
            start_time,
            &config.training.note,
        );

        let mut trainer = Self::new(
            env,
            policy,
            config.training.clone(),
            config.agent.epsilon_start,
            layout,
            shutdown,
        );
        if let Some(path) = config.training.resume_path.clone() {
            trainer.resume(&path)?;
        }
        Ok(trainer)
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn environment(&self) -> &Environment<B> {
        &self.env
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Continue from a saved table. A missing artifact, or one whose action
    /// count differs from the environment's, is an error and leaves the
    /// current policy in place.
    pub fn resume(&mut self, path: &Path) -> TrainResult<()> {
        let mut loaded = self.policy.clone();
        if let Err(e) = loaded.load(path) {
            error!(path = %path.display(), error = %e, "failed to resume from checkpoint");
            return Err(e.into());
        }
        let expected = self.env.settings().n_actions;
        if loaded.n_actions() != expected {
            error!(
                path = %path.display(),
                expected,
                found = loaded.n_actions(),
                "checkpoint action count does not match environment"
            );
            return Err(TrainError::ActionCountMismatch {
                path: path.to_path_buf(),
                expected,
                found: loaded.n_actions(),
            });
        }
        self.policy = loaded;
        info!(
            path = %path.display(),
            states = self.policy.table_len(),
            episodes_trained = self.policy.episodes_trained(),
            "resumed training"
        );

        if self.training.reset_epsilon {
            self.policy.set_epsilon(self.epsilon_start);
            info!(epsilon = self.epsilon_start, "epsilon reset");
        }
        if let Some(decay) = self.training.epsilon_decay_override {
            self.policy.set_epsilon_decay(decay);
            info!(epsilon_decay = decay, "epsilon decay changed");
        }
        Ok(())
    }

    /// Run the configured number of episodes.
    ///
    /// An interrupt saves to `interrupted/` and returns normally with
    /// `interrupted` set. Any error saves to `error/` before it is returned.
    /// A run that finishes saves to `final/`.
    pub async fn train(&mut self) -> TrainResult<TrainingReport> {
        let mut report = TrainingReport::default();
        info!(
            algorithm = %self.policy.algorithm(),
            episodes = self.training.episodes,
            run_dir = %self.layout.root().display(),
            "training started"
        );

        if let Err(e) = self.run_training(&mut report).await {
            let path = self
                .layout
                .error(self.policy.episodes_trained(), epoch_secs());
            let saved = self.save_best_effort(&path);
            error!(
                error = %e,
                episodes_completed = report.episodes_completed,
                checkpoint = ?saved,
                "training failed"
            );
            return Err(e);
        }

        if report.interrupted {
            warn!(
                episodes_completed = report.episodes_completed,
                "training interrupted, saving checkpoint"
            );
            let path = self
                .layout
                .interrupted(self.policy.episodes_trained(), epoch_secs());
            report.interrupted_checkpoint = self.save_best_effort(&path);
        } else {
            let path = self.layout.final_checkpoint(epoch_secs());
            report.final_checkpoint = self.save_best_effort(&path);
        }

        info!(
            episodes_completed = report.episodes_completed,
            best_total = ?report.best_total,
            states = self.policy.table_len(),
            "training finished"
        );
        Ok(report)
    }

    async fn run_training(&mut self, report: &mut TrainingReport) -> TrainResult<()> {
        let episodes = self.training.episodes;
        for episode in 0..episodes {
            info!(
                episode = episode + 1,
                episodes,
                episodes_trained = self.policy.episodes_trained(),
                "episode started"
            );
            let outcome = match self.run_episode(episode, true).await? {
                EpisodeOutcome::Completed(outcome) => outcome,
                EpisodeOutcome::Interrupted => {
                    report.interrupted = true;
                    return Ok(());
                }
            };

            self.policy.add_episode_count(1);
            report.episodes_completed += 1;
            report.returns.push(outcome.total_reward);
            info!(
                episode = episode + 1,
                total_reward = outcome.total_reward,
                steps = outcome.steps,
                replicas = outcome.final_replicas,
                epsilon = outcome.epsilon,
                states = self.policy.table_len(),
                "episode complete"
            );

            if report
                .best_total
                .is_none_or(|best| outcome.total_reward > best)
            {
                let path = self.layout.best(episode, outcome.total_reward);
                self.policy.save(&path, self.policy.episodes_trained())?;
                info!(total_reward = outcome.total_reward, path = %path.display(), "new best model saved");
                report.best_total = Some(outcome.total_reward);
                report.best_checkpoint = Some(path);
            }

            let interval = self.training.checkpoint_interval;
            if interval > 0 && report.episodes_completed % interval == 0 {
                let path = self.layout.periodic(report.episodes_completed);
                self.policy.save(&path, self.policy.episodes_trained())?;
            }
        }
        Ok(())
    }

    /// Run episodes greedily without touching the table. Epsilon is
    /// restored afterwards.
    pub async fn evaluate(&mut self, episodes: u32) -> TrainResult<EvaluationReport> {
        let epsilon = self.policy.epsilon();
        self.policy.set_epsilon(0.0);
        let result = self.run_evaluation(episodes).await;
        self.policy.set_epsilon(epsilon);

        let report = result?;
        info!(
            episodes = report.episodes.len(),
            mean_return = ?report.mean_return,
            interrupted = report.interrupted,
            "evaluation finished"
        );
        Ok(report)
    }

    async fn run_evaluation(&mut self, episodes: u32) -> TrainResult<EvaluationReport> {
        let mut report = EvaluationReport::default();
        for episode in 0..episodes {
            match self.run_episode(episode, false).await? {
                EpisodeOutcome::Completed(outcome) => {
                    info!(
                        episode = episode + 1,
                        total_reward = outcome.total_reward,
                        replicas = outcome.final_replicas,
                        "evaluation episode complete"
                    );
                    report.episodes.push(outcome);
                }
                EpisodeOutcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
            }
        }
        if !report.episodes.is_empty() {
            let total: f64 = report.episodes.iter().map(|e| e.total_reward).sum();
            report.mean_return = Some(total / report.episodes.len() as f64);
        }
        Ok(report)
    }

    async fn run_episode(&mut self, episode: u32, learn: bool) -> TrainResult<EpisodeOutcome> {
        if *self.shutdown.borrow() {
            return Ok(EpisodeOutcome::Interrupted);
        }
        let mut observation: Observation = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut self.shutdown) => return Ok(EpisodeOutcome::Interrupted),
            reset = self.env.reset() => reset?,
        };

        let mut total_reward = 0.0;
        let mut steps = 0;
        loop {
            if *self.shutdown.borrow() {
                return Ok(EpisodeOutcome::Interrupted);
            }
            let action = self.policy.get_action(&observation);
            let transition = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut self.shutdown) => return Ok(EpisodeOutcome::Interrupted),
                step = self.env.step(action) => step?,
            };

            if learn {
                self.policy.update(
                    &observation,
                    action,
                    transition.reward,
                    &transition.observation,
                )?;
            }
            total_reward += transition.reward;
            steps += 1;
            observation = transition.observation;

            if transition.terminated {
                break;
            }
        }

        Ok(EpisodeOutcome::Completed(EpisodeReport {
            episode,
            total_reward,
            steps,
            final_replicas: self.env.replica_state(),
            epsilon: self.policy.epsilon(),
        }))
    }

    fn save_best_effort(&self, path: &Path) -> Option<PathBuf> {
        match self.policy.save(path, self.policy.episodes_trained()) {
            Ok(()) => Some(path.to_path_buf()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save checkpoint");
                None
            }
        }
    }
}

/// Resolves once shutdown has been signalled. A dropped sender never
/// signals.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlscale_core::Algorithm;
    use rlscale_env::{LoadCurve, SimConfig, SimulatedCluster};

    fn config(dir: &Path, episodes: u32) -> ControllerConfig {
        let mut config = ControllerConfig::default();
        config.workload.min_replicas = 1;
        config.workload.max_replicas = 10;
        config.training.episodes = episodes;
        config.training.iteration = 4;
        config.training.checkpoint_dir = dir.to_path_buf();
        config.training.note = "unit".to_string();
        config.agent.seed = Some(7);
        config
    }

    fn sim() -> SimulatedCluster {
        SimulatedCluster::new(SimConfig {
            load: LoadCurve::Constant { rps: 300.0 },
            noise: 0.0,
            seed: Some(3),
            ..SimConfig::default()
        })
    }

    fn trainer(
        config: &ControllerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Trainer<SimulatedCluster> {
        let env = Environment::from_config(sim(), config).unwrap();
        Trainer::from_config(env, config, shutdown).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn training_saves_best_and_final() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 3);
        let (_tx, rx) = watch::channel(false);
        let mut trainer = trainer(&config, rx);

        let report = trainer.train().await.unwrap();
        assert_eq!(report.episodes_completed, 3);
        assert_eq!(report.returns.len(), 3);
        assert!(!report.interrupted);
        assert!(report.best_checkpoint.as_ref().unwrap().exists());
        assert!(report.final_checkpoint.as_ref().unwrap().exists());
        assert!(report.interrupted_checkpoint.is_none());

        let best = report.returns.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(report.best_total, Some(best));
        assert_eq!(trainer.policy().episodes_trained(), 3);
        assert!(trainer.policy().table_len() > 0);
        assert_eq!(
            trainer.environment().backend().desired(),
            trainer.environment().replica_state()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn signalled_shutdown_saves_interrupted_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 5);
        let (tx, rx) = watch::channel(false);
        let mut trainer = trainer(&config, rx);
        tx.send(true).unwrap();

        let report = trainer.train().await.unwrap();
        assert!(report.interrupted);
        assert_eq!(report.episodes_completed, 0);
        assert!(report.final_checkpoint.is_none());
        let path = report.interrupted_checkpoint.unwrap();
        assert!(path.starts_with(trainer.layout().root().join("interrupted")));
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn evaluation_keeps_known_q_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 2);
        let (_tx, rx) = watch::channel(false);
        let mut trainer = trainer(&config, rx);
        trainer.train().await.unwrap();

        let before = trainer.policy().q_values();
        let epsilon = trainer.policy().epsilon();
        let report = trainer.evaluate(2).await.unwrap();

        assert_eq!(report.episodes.len(), 2);
        assert!(report.mean_return.is_some());
        assert_eq!(trainer.policy().epsilon(), epsilon);

        // Unseen states gain zero rows; known rows keep their values.
        let after = trainer.policy().q_values();
        assert!(after.len() >= before.len());
        for (state, values) in &before {
            let row = after.iter().find(|(s, _)| s == state).map(|(_, v)| v);
            assert_eq!(row, Some(values), "{state:?}");
        }
        for (state, values) in &after {
            if !before.iter().any(|(s, _)| s == state) {
                assert!(values.iter().all(|v| *v == 0.0), "{state:?}");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resume_loads_table_and_resets_epsilon() {
        let dir = tempfile::tempdir().unwrap();
        let first = config(dir.path(), 2);
        let (_tx, rx) = watch::channel(false);
        let mut first_run = trainer(&first, rx.clone());
        let report = first_run.train().await.unwrap();
        let saved = report.final_checkpoint.unwrap();
        let states = first_run.policy().table_len();

        let mut second = config(dir.path(), 1);
        second.training.resume_path = Some(saved);
        second.training.epsilon_decay_override = Some(0.5);
        let resumed = trainer(&second, rx);
        assert_eq!(resumed.policy().table_len(), states);
        assert_eq!(resumed.policy().episodes_trained(), 2);
        assert_eq!(resumed.policy().epsilon(), second.agent.epsilon_start);
        assert_eq!(resumed.policy().params().epsilon_decay, 0.5);
    }

    #[test]
    fn resume_from_missing_checkpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 1);
        config.training.resume_path = Some(dir.path().join("absent.json"));
        config.agent.algorithm = Algorithm::FuzzyHybrid;
        let (_tx, rx) = watch::channel(false);
        let env = Environment::from_config(sim(), &config).unwrap();
        assert!(Trainer::from_config(env, &config, rx).is_err());
    }

    #[test]
    fn resume_rejects_a_different_action_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.json");
        let mut wide_config = config(dir.path(), 1);
        wide_config.agent.algorithm = Algorithm::FuzzyHybrid;
        wide_config.agent.n_actions = 100;
        let mut wide = Policy::from_config(&wide_config.agent, None, 0).unwrap();
        let low = Observation {
            cpu_usage: 10.0,
            memory_usage: 10.0,
            response_time: 10.0,
            last_action: 0,
        };
        let high = Observation {
            cpu_usage: 95.0,
            memory_usage: 95.0,
            response_time: 95.0,
            last_action: 99,
        };
        wide.update(&low, 99, 5.0, &high).unwrap();
        wide.save(&path, 1).unwrap();

        let mut narrow = wide_config.clone();
        narrow.agent.n_actions = 10;
        narrow.training.resume_path = Some(path.clone());
        let (_tx, rx) = watch::channel(false);
        let env = Environment::from_config(sim(), &narrow).unwrap();
        let err = Trainer::from_config(env, &narrow, rx).err().unwrap();
        assert!(
            matches!(
                err,
                TrainError::ActionCountMismatch {
                    expected: 10,
                    found: 100,
                    ..
                }
            ),
            "{err}"
        );

        // A failed resume keeps the policy the trainer already had.
        narrow.training.resume_path = None;
        let (_tx, rx) = watch::channel(false);
        let mut fresh = trainer(&narrow, rx);
        assert!(fresh.resume(&path).is_err());
        assert_eq!(fresh.policy().n_actions(), 10);
        assert_eq!(fresh.policy().table_len(), 0);
    }

    #[tokio::test]
    async fn dropped_sender_never_signals() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            wait_for_shutdown(&mut rx),
        )
        .await;
        assert!(waited.is_err());
    }
}
