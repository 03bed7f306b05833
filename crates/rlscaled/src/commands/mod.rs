pub mod evaluate;
pub mod inspect;
pub mod scaffold;
pub mod train;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use rlscale_core::ControllerConfig;
use rlscale_env::{Environment, JsonLinesSink, LogSink, MultiSink, SimConfig, SimulatedCluster};

/// Simulated cluster settings from `path`, or the defaults.
pub fn load_sim_config(path: Option<&Path>) -> anyhow::Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: SimConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// Environment over the simulated cluster, with telemetry wired to the log
/// and, when configured, a JSON-lines file.
pub fn build_environment(
    config: &ControllerConfig,
    sim: SimConfig,
) -> anyhow::Result<Environment<SimulatedCluster>> {
    let mut sinks = MultiSink::new().with(LogSink);
    if let Some(path) = &config.telemetry.jsonl_path {
        let sink = JsonLinesSink::open(path)
            .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
        info!(path = %path.display(), "writing telemetry points");
        sinks = sinks.with(sink);
    }

    let env = Environment::from_config(SimulatedCluster::new(sim), config)?
        .with_telemetry(Arc::new(sinks))
        .with_tag("algorithm", config.agent.algorithm.as_str());
    Ok(env)
}

/// Shutdown channel flipped by Ctrl-C.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!(error = %e, "failed to install Ctrl-C handler"),
        }
    });
    shutdown_rx
}
