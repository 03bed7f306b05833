//! End-to-end episodes against the simulated cluster.

use std::sync::Arc;

use rlscale_core::ControllerConfig;
use rlscale_env::{Environment, JsonLinesSink, LoadCurve, Point, SimConfig, SimulatedCluster};

fn config(iteration: u32) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    config.workload.min_replicas = 1;
    config.workload.max_replicas = 10;
    config.training.iteration = iteration;
    config
}

#[tokio::test(start_paused = true)]
async fn episode_survives_injected_conflicts() {
    let sim = SimulatedCluster::new(SimConfig {
        load: LoadCurve::Constant { rps: 400.0 },
        conflict_rate: 0.9,
        seed: Some(9),
        ..SimConfig::default()
    });

    let dir = tempfile::tempdir().unwrap();
    let points = dir.path().join("points.jsonl");
    let sink = JsonLinesSink::open(&points).unwrap();

    let mut env = Environment::from_config(sim, &config(6))
        .unwrap()
        .with_telemetry(Arc::new(sink))
        .with_tag("algorithm", "Q");

    env.reset().await.unwrap();
    let mut steps = 0;
    for action in [99, 60, 30, 0, 45, 80] {
        let t = env.step(action).await.unwrap();
        steps += 1;
        assert!((-1.0..=1.0).contains(&t.reward));
        assert_eq!(t.info.replica_state, env.backend().desired());
        if t.terminated {
            break;
        }
    }
    assert_eq!(steps, 6);
    // One accepted request per reset and step, plus every rejected one.
    let conflicts = env.backend().conflicts_injected();
    assert!(conflicts > 0);
    assert_eq!(env.backend().scale_requests(), 7 + conflicts);

    let written: Vec<Point> = std::fs::read_to_string(&points)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    // The reset point, then one per step.
    assert_eq!(written.len(), 7);
    assert!(written.iter().all(|p| p.tags["algorithm"] == "Q"));
    assert_eq!(written[0].fields["replicas"], 1.0);
    assert_eq!(written[1].fields["replicas"], 10.0);
}

#[tokio::test(start_paused = true)]
async fn scaling_out_relieves_an_overloaded_workload() {
    let sim = SimulatedCluster::new(SimConfig {
        load: LoadCurve::Constant { rps: 600.0 },
        noise: 0.0,
        seed: Some(1),
        ..SimConfig::default()
    });
    let mut env = Environment::from_config(sim, &config(2)).unwrap();

    let at_min = env.reset().await.unwrap();
    assert_eq!(at_min.cpu_usage, 100.0);
    assert_eq!(at_min.response_time, 100.0);

    let out = env.step(99).await.unwrap();
    assert!(out.observation.cpu_usage < 80.0);
    assert!(out.info.response_time_ms < at_min.response_time * 10.0);
    assert_eq!(out.info.ready_replicas, 10);
}
