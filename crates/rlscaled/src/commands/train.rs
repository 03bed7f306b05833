use std::path::PathBuf;

use tracing::info;

use rlscale_core::ControllerConfig;
use rlscale_trainer::Trainer;

use super::{build_environment, load_sim_config, shutdown_on_ctrl_c};

pub struct TrainArgs {
    pub config: PathBuf,
    pub episodes: Option<u32>,
    pub note: Option<String>,
    pub resume: Option<PathBuf>,
    pub sim_config: Option<PathBuf>,
}

pub async fn run(args: TrainArgs) -> anyhow::Result<()> {
    let mut config = ControllerConfig::from_file(&args.config)?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let sim = load_sim_config(args.sim_config.as_deref())?;
    let env = build_environment(&config, sim)?;
    let mut trainer = Trainer::from_config(env, &config, shutdown_on_ctrl_c())?;
    info!(
        workload = %config.workload.workload_ref(),
        algorithm = %config.agent.algorithm,
        run_dir = %trainer.layout().root().display(),
        "rlscaled training"
    );

    let report = trainer.train().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn apply_overrides(config: &mut ControllerConfig, args: &TrainArgs) {
    if let Some(episodes) = args.episodes {
        config.training.episodes = episodes;
    }
    if let Some(note) = &args.note {
        config.training.note = note.clone();
    }
    if let Some(resume) = &args.resume {
        config.training.resume_path = Some(resume.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut config = ControllerConfig::default();
        let args = TrainArgs {
            config: PathBuf::from("rlscale.toml"),
            episodes: Some(42),
            note: Some("sweep".to_string()),
            resume: Some(PathBuf::from("model/q.json")),
            sim_config: None,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.training.episodes, 42);
        assert_eq!(config.training.note, "sweep");
        assert_eq!(
            config.training.resume_path,
            Some(PathBuf::from("model/q.json"))
        );
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = ControllerConfig::default();
        config.training.episodes = 7;
        let args = TrainArgs {
            config: PathBuf::from("rlscale.toml"),
            episodes: None,
            note: None,
            resume: None,
            sim_config: None,
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.training.episodes, 7);
        assert_eq!(config.training.note, "default");
        assert!(config.training.resume_path.is_none());
    }
}
