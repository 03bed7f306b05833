//! Full training runs against a simulated cluster with scripted faults.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use rlscale_core::{Algorithm, ControllerConfig, WorkloadRef};
use rlscale_env::{
    Actuator, BackendError, ConvergenceObserver, Environment, LoadCurve, MetricsProvider,
    MetricsQuery, MetricsSample, ReplicaStatus, ScaleError, SimConfig, SimulatedCluster,
};
use rlscale_policy::Policy;
use rlscale_trainer::{TrainError, Trainer};

/// Wraps the simulation to trip shutdown or fail metrics after a number
/// of calls.
struct ScriptedCluster {
    inner: SimulatedCluster,
    shutdown_after_scales: Option<(u64, watch::Sender<bool>)>,
    fail_metrics_after: Option<u64>,
    scales: AtomicU64,
    samples: AtomicU64,
}

impl ScriptedCluster {
    fn new() -> Self {
        Self {
            inner: SimulatedCluster::new(SimConfig {
                load: LoadCurve::Steps {
                    rps: vec![150.0, 450.0, 700.0, 250.0],
                },
                noise: 0.0,
                seed: Some(11),
                ..SimConfig::default()
            }),
            shutdown_after_scales: None,
            fail_metrics_after: None,
            scales: AtomicU64::new(0),
            samples: AtomicU64::new(0),
        }
    }
}

impl Actuator for ScriptedCluster {
    async fn scale(
        &self,
        workload: &WorkloadRef,
        replicas: u32,
        timeout: Duration,
    ) -> Result<(), ScaleError> {
        let n = self.scales.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, tx)) = &self.shutdown_after_scales {
            if n >= *after {
                let _ = tx.send(true);
            }
        }
        self.inner.scale(workload, replicas, timeout).await
    }
}

impl ConvergenceObserver for ScriptedCluster {
    async fn replica_status(&self, workload: &WorkloadRef) -> Result<ReplicaStatus, BackendError> {
        self.inner.replica_status(workload).await
    }
}

impl MetricsProvider for ScriptedCluster {
    async fn sample(
        &self,
        workload: &WorkloadRef,
        query: MetricsQuery,
    ) -> Result<MetricsSample, BackendError> {
        let n = self.samples.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_metrics_after.is_some_and(|after| n > after) {
            return Err(BackendError::Query("metric series dropped".into()));
        }
        self.inner.sample(workload, query).await
    }
}

fn config(dir: &Path, algorithm: Algorithm, episodes: u32) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.workload.min_replicas = 1;
    config.workload.max_replicas = 10;
    config.agent.algorithm = algorithm;
    config.agent.seed = Some(5);
    config.training.episodes = episodes;
    config.training.iteration = 5;
    config.training.checkpoint_dir = dir.to_path_buf();
    config.training.note = "it".to_string();
    config
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

#[tokio::test(start_paused = true)]
async fn every_algorithm_trains_and_checkpoints() {
    for algorithm in [
        Algorithm::QLearning,
        Algorithm::FuzzyHybrid,
        Algorithm::FuzzyOverride,
    ] {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), algorithm, 4);
        config.training.checkpoint_interval = 2;
        let (_tx, rx) = watch::channel(false);
        let env = Environment::from_config(ScriptedCluster::new(), &config).unwrap();
        let mut trainer = Trainer::from_config(env, &config, rx).unwrap();

        let report = trainer.train().await.unwrap();
        assert_eq!(report.episodes_completed, 4, "{algorithm}");

        let root = trainer.layout().root().to_path_buf();
        assert!(root.starts_with(dir.path().join(algorithm.model_dir())));
        let checkpoints = files_in(&root.join("checkpoints"));
        assert!(checkpoints.contains(&"periodic_episode_2.json".to_string()));
        assert!(checkpoints.contains(&"periodic_episode_4.json".to_string()));
        assert!(checkpoints.iter().any(|f| f.starts_with("episode_0_total_")));
        assert_eq!(files_in(&root.join("final")).len(), 1);
        assert!(files_in(&root.join("interrupted")).is_empty());

        // The final artifact restores into a fresh policy of the same kind.
        let mut restored = Policy::from_config(&config.agent, None, 0).unwrap();
        restored
            .load(report.final_checkpoint.as_ref().unwrap())
            .unwrap();
        assert_eq!(restored.table_len(), trainer.policy().table_len());
        assert_eq!(restored.episodes_trained(), 4);
    }
}

#[tokio::test(start_paused = true)]
async fn interrupt_mid_episode_checkpoints_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), Algorithm::QLearning, 10);
    let (tx, rx) = watch::channel(false);

    let mut backend = ScriptedCluster::new();
    // Reset plus five steps per episode; trip during the second episode.
    backend.shutdown_after_scales = Some((9, tx));
    let env = Environment::from_config(backend, &config).unwrap();
    let mut trainer = Trainer::from_config(env, &config, rx).unwrap();

    let report = trainer.train().await.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.episodes_completed, 1);
    assert!(report.final_checkpoint.is_none());

    let path = report.interrupted_checkpoint.unwrap();
    assert!(path.exists());
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("interrupted_episode_1_"), "{name}");
    assert!(files_in(&trainer.layout().root().join("final")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_failure_saves_error_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), Algorithm::FuzzyHybrid, 3);
    let (_tx, rx) = watch::channel(false);

    let mut backend = ScriptedCluster::new();
    backend.fail_metrics_after = Some(8);
    let env = Environment::from_config(backend, &config).unwrap();
    let mut trainer = Trainer::from_config(env, &config, rx).unwrap();

    let err = trainer.train().await.unwrap_err();
    assert!(matches!(err, TrainError::Env(_)), "{err}");

    let root = trainer.layout().root();
    let saved = files_in(&root.join("error"));
    assert_eq!(saved.len(), 1);
    assert!(saved[0].starts_with("error_episode_1_"));
    assert!(files_in(&root.join("final")).is_empty());
}

#[tokio::test(start_paused = true)]
async fn greedy_evaluation_is_repeatable_for_a_fixed_table() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), Algorithm::QLearning, 3);
    let (_tx, rx) = watch::channel(false);
    let env = Environment::from_config(ScriptedCluster::new(), &config).unwrap();
    let mut trainer = Trainer::from_config(env, &config, rx).unwrap();
    let report = trainer.train().await.unwrap();
    let model = report.final_checkpoint.unwrap();

    let mut actions = Vec::new();
    for _ in 0..2 {
        let mut eval_config = config.clone();
        eval_config.training.resume_path = Some(model.clone());
        let (_tx, rx) = watch::channel(false);
        let env = Environment::from_config(ScriptedCluster::new(), &eval_config).unwrap();
        let mut evaluator = Trainer::from_config(env, &eval_config, rx).unwrap();
        let known = evaluator.policy().q_values();

        let eval = evaluator.evaluate(2).await.unwrap();
        assert_eq!(eval.episodes.len(), 2);
        let after = evaluator.policy().q_values();
        assert!(known.iter().all(|row| after.contains(row)));
        actions.push(
            eval.episodes
                .iter()
                .map(|e| (e.final_replicas, e.total_reward))
                .collect::<Vec<_>>(),
        );
    }
    assert_eq!(actions[0], actions[1]);
}
