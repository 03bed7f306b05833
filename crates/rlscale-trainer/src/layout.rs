//! On-disk layout of one training run.
//!
//! ```text
//! <checkpoint_dir>/<algorithm>/<start_time>_<note>/
//!   checkpoints/episode_<i>_total_<score>.json
//!   checkpoints/periodic_episode_<n>.json
//!   interrupted/interrupted_episode_<n>_<ts>.json
//!   error/error_episode_<n>_<ts>.json
//!   final/<algorithm>_<ts>.json
//! ```

use std::path::{Path, PathBuf};

use rlscale_core::Algorithm;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
    algorithm: Algorithm,
}

impl RunLayout {
    pub fn new(checkpoint_dir: &Path, algorithm: Algorithm, start_time: u64, note: &str) -> Self {
        let root = checkpoint_dir
            .join(algorithm.model_dir())
            .join(format!("{start_time}_{}", sanitize(note)));
        Self { root, algorithm }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// New best checkpoint for the zero-based `episode`.
    pub fn best(&self, episode: u32, total: f64) -> PathBuf {
        self.root
            .join("checkpoints")
            .join(format!("episode_{episode}_total_{total:.4}.json"))
    }

    pub fn periodic(&self, episodes_done: u32) -> PathBuf {
        self.root
            .join("checkpoints")
            .join(format!("periodic_episode_{episodes_done}.json"))
    }

    pub fn interrupted(&self, episodes_trained: u64, timestamp: u64) -> PathBuf {
        self.root
            .join("interrupted")
            .join(format!("interrupted_episode_{episodes_trained}_{timestamp}.json"))
    }

    pub fn error(&self, episodes_trained: u64, timestamp: u64) -> PathBuf {
        self.root
            .join("error")
            .join(format!("error_episode_{episodes_trained}_{timestamp}.json"))
    }

    pub fn final_checkpoint(&self, timestamp: u64) -> PathBuf {
        self.root
            .join("final")
            .join(format!("{}_{timestamp}.json", self.algorithm.model_dir()))
    }
}

/// Keep notes usable as a single path component.
fn sanitize(note: &str) -> String {
    let cleaned: String = note
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "default".to_string()
    } else {
        cleaned
    }
}
