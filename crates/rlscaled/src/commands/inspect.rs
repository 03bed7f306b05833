use std::path::Path;

use rlscale_core::Algorithm;
use rlscale_core::config::AgentConfig;
use rlscale_policy::{Policy, PolicyError};

pub fn run(
    model: &Path,
    algorithm: Option<Algorithm>,
    max_states: usize,
    format: &str,
) -> anyhow::Result<()> {
    let policy = load_policy(model, algorithm)?;
    let summary = policy.summary(max_states);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print!("{summary}");
        }
    }

    Ok(())
}

/// Load `model` into a policy of the given kind. Without one, tabular and
/// fuzzy-keyed tables are told apart by their state keys; override tables
/// share the tabular layout and load as Q-learning.
pub fn load_policy(model: &Path, algorithm: Option<Algorithm>) -> anyhow::Result<Policy> {
    let candidates = match algorithm {
        Some(algorithm) => vec![algorithm],
        None => vec![Algorithm::QLearning, Algorithm::FuzzyHybrid],
    };

    let mut last_error = None;
    for algorithm in candidates {
        let agent = AgentConfig {
            algorithm,
            ..AgentConfig::default()
        };
        let mut policy = Policy::from_config(&agent, None, 0)?;
        match policy.load(model) {
            Ok(()) => return Ok(policy),
            Err(e @ PolicyError::Deserialize(_)) => last_error = Some(e),
            Err(e) => return Err(e.into()),
        }
    }
    match last_error {
        Some(e) => Err(anyhow::anyhow!("{} does not hold a known Q-table: {e}", model.display())),
        None => anyhow::bail!("no policy kind to try for {}", model.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rlscale_core::Observation;

    fn trained(algorithm: Algorithm) -> Policy {
        let agent = AgentConfig {
            algorithm,
            seed: Some(1),
            ..AgentConfig::default()
        };
        let mut policy = Policy::from_config(&agent, None, 0).unwrap();
        let obs = Observation {
            cpu_usage: 85.0,
            memory_usage: 40.0,
            response_time: 70.0,
            last_action: 10,
        };
        let next = Observation {
            cpu_usage: 45.0,
            last_action: 60,
            ..obs
        };
        policy.update(&obs, 60, 0.8, &next).unwrap();
        policy
    }

    #[test]
    fn detects_fuzzy_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hybrid.json");
        trained(Algorithm::FuzzyHybrid).save(&path, 3).unwrap();

        let policy = load_policy(&path, None).unwrap();
        assert_eq!(policy.algorithm(), Algorithm::FuzzyHybrid);
        assert_eq!(policy.episodes_trained(), 3);
        assert_eq!(policy.table_len(), 1);
    }

    #[test]
    fn tabular_tables_load_as_q_learning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        trained(Algorithm::FuzzyOverride).save(&path, 1).unwrap();

        assert_eq!(
            load_policy(&path, None).unwrap().algorithm(),
            Algorithm::QLearning
        );
        assert_eq!(
            load_policy(&path, Some(Algorithm::FuzzyOverride))
                .unwrap()
                .algorithm(),
            Algorithm::FuzzyOverride
        );
    }

    #[test]
    fn explicit_kind_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.json");
        trained(Algorithm::QLearning).save(&path, 1).unwrap();
        assert!(load_policy(&path, Some(Algorithm::FuzzyHybrid)).is_err());
    }

    #[test]
    fn missing_model_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_policy(&dir.path().join("absent.json"), None).unwrap_err();
        assert!(err.to_string().contains("absent.json"), "{err}");
    }
}
