use std::path::Path;

use rlscale_core::ControllerConfig;
use rlscale_trainer::Trainer;

use super::{build_environment, load_sim_config, shutdown_on_ctrl_c};

pub async fn run(
    config_path: &Path,
    model: &Path,
    episodes: u32,
    sim_config: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = ControllerConfig::from_file(config_path)?;
    config.training.resume_path = Some(model.to_path_buf());

    let sim = load_sim_config(sim_config)?;
    let env = build_environment(&config, sim)?;
    let mut trainer = Trainer::from_config(env, &config, shutdown_on_ctrl_c())?;

    let report = trainer.evaluate(episodes).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
