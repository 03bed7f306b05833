//! Checkpoint artifact: one JSON record holding the Q-table and the
//! hyperparameters needed to resume learning.
//!
//! Writes go to a sibling temp file that is renamed into place, so a
//! reader never observes a partially written checkpoint.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PolicyError, PolicyResult};
use crate::table::StateKey;

/// One Q-table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QEntry<K> {
    pub state: K,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<K> {
    pub q_table: Vec<QEntry<K>>,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
    pub n_actions: usize,
    /// Unix timestamp (seconds) of the run that created the policy.
    pub created_at: u64,
    pub episodes_trained: u64,
}

impl<K: StateKey> Checkpoint<K> {
    /// Atomically write the checkpoint to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> PolicyResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PolicyError::io(parent, e))?;
        }

        let bytes =
            serde_json::to_vec(self).map_err(|e| PolicyError::Serialize(e.to_string()))?;
        let tmp = temp_path(path);
        {
            let mut file = fs::File::create(&tmp).map_err(|e| PolicyError::io(&tmp, e))?;
            file.write_all(&bytes).map_err(|e| PolicyError::io(&tmp, e))?;
            file.sync_all().map_err(|e| PolicyError::io(&tmp, e))?;
        }
        fs::rename(&tmp, path).map_err(|e| PolicyError::io(path, e))?;

        debug!(path = %path.display(), states = self.q_table.len(), "checkpoint written");
        Ok(())
    }

    /// Read a checkpoint. Fails with `NotFound` when the artifact is absent.
    pub fn load(path: &Path) -> PolicyResult<Self> {
        if !path.exists() {
            return Err(PolicyError::NotFound(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|e| PolicyError::io(path, e))?;
        let checkpoint: Self =
            serde_json::from_slice(&bytes).map_err(|e| PolicyError::Deserialize(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    fn validate(&self) -> PolicyResult<()> {
        if self.n_actions == 0 {
            return Err(PolicyError::InvalidCheckpoint("n_actions is zero".to_string()));
        }
        if let Some(row) = self.q_table.iter().find(|r| r.values.len() != self.n_actions) {
            return Err(PolicyError::InvalidCheckpoint(format!(
                "row has {} values, expected {}",
                row.values.len(),
                self.n_actions
            )));
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Checkpoint<(i64, i64)> {
        Checkpoint {
            q_table: vec![
                QEntry {
                    state: (1, 2),
                    values: vec![0.1, -0.25, 1.0 / 3.0],
                },
                QEntry {
                    state: (3, 4),
                    values: vec![0.0, 0.0, 0.0],
                },
            ],
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon: 0.07,
            epsilon_min: 0.01,
            epsilon_decay: 0.99,
            n_actions: 3,
            created_at: 1_700_000_000,
            episodes_trained: 12,
        }
    }

    #[test]
    fn save_then_load_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/model.json");

        let checkpoint = sample();
        checkpoint.save(&path).unwrap();
        let loaded = Checkpoint::<(i64, i64)>::load(&path).unwrap();
        assert_eq!(loaded, checkpoint);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Checkpoint::<(i64, i64)>::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, PolicyError::NotFound(_)));
    }

    #[test]
    fn load_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut checkpoint = sample();
        checkpoint.q_table[0].values.pop();
        checkpoint.save(&path).unwrap();

        let err = Checkpoint::<(i64, i64)>::load(&path).unwrap_err();
        assert!(matches!(err, PolicyError::InvalidCheckpoint(_)));
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.json");
        fs::write(&path, b"not json").unwrap();
        let err = Checkpoint::<(i64, i64)>::load(&path).unwrap_err();
        assert!(matches!(err, PolicyError::Deserialize(_)));
    }
}
