//! rlscale.toml configuration parser.
//!
//! Every section and field is optional. Missing values fall back to the
//! defaults the controller was tuned with.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::WorkloadRef;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub workload: WorkloadConfig,
    pub bounds: BoundsConfig,
    pub timing: TimingConfig,
    pub scaling: ScalingConfig,
    pub reward: RewardConfig,
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub fuzzy: Option<FuzzyConfig>,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub namespace: String,
    pub name: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            name: "ecom-api".to_string(),
            min_replicas: 1,
            max_replicas: 12,
        }
    }
}

impl WorkloadConfig {
    pub fn workload_ref(&self) -> WorkloadRef {
        WorkloadRef::new(&self.namespace, &self.name)
    }
}

/// Resource bounds and the latency SLA used by the reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    pub min_cpu: f64,
    pub max_cpu: f64,
    pub min_memory: f64,
    pub max_memory: f64,
    /// Response-time SLA in milliseconds.
    pub max_response_time: f64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            min_cpu: 10.0,
            max_cpu: 90.0,
            min_memory: 10.0,
            max_memory: 90.0,
            max_response_time: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Bound on convergence polling and on metrics collection (e.g. "120s").
    pub timeout: String,
    /// Extra warm-up wait after a scale-up, before sampling metrics.
    pub wait_time: String,
    /// Window the metrics backend aggregates over.
    pub metrics_interval: String,
    /// Latency quantile requested from the metrics backend.
    pub metrics_quantile: f64,
    /// Interval between readiness polls.
    pub readiness_poll_interval: String,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            timeout: "120s".to_string(),
            wait_time: "60s".to_string(),
            metrics_interval: "15s".to_string(),
            metrics_quantile: 0.90,
            readiness_poll_interval: "5s".to_string(),
        }
    }
}

impl TimingConfig {
    pub fn timeout(&self) -> ConfigResult<Duration> {
        parse_field("timing.timeout", &self.timeout)
    }

    pub fn wait_time(&self) -> ConfigResult<Duration> {
        parse_field("timing.wait_time", &self.wait_time)
    }

    pub fn metrics_interval(&self) -> ConfigResult<Duration> {
        parse_field("timing.metrics_interval", &self.metrics_interval)
    }

    pub fn readiness_poll_interval(&self) -> ConfigResult<Duration> {
        parse_field("timing.readiness_poll_interval", &self.readiness_poll_interval)
    }
}

/// Retry budget for actuation calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingConfig {
    pub max_scaling_retries: u32,
    /// Per-attempt timeout of the first attempt; grows ×1.5 per attempt.
    pub base_timeout: String,
    pub max_timeout: String,
    /// Delay after the first failed attempt; doubles per attempt.
    pub base_delay: String,
    pub max_delay: String,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            max_scaling_retries: 1000,
            base_timeout: "30s".to_string(),
            max_timeout: "120s".to_string(),
            base_delay: "1s".to_string(),
            max_delay: "60s".to_string(),
        }
    }
}

impl ScalingConfig {
    pub fn base_timeout(&self) -> ConfigResult<Duration> {
        parse_field("scaling.base_timeout", &self.base_timeout)
    }

    pub fn max_timeout(&self) -> ConfigResult<Duration> {
        parse_field("scaling.max_timeout", &self.max_timeout)
    }

    pub fn base_delay(&self) -> ConfigResult<Duration> {
        parse_field("scaling.base_delay", &self.base_delay)
    }

    pub fn max_delay(&self) -> ConfigResult<Duration> {
        parse_field("scaling.max_delay", &self.max_delay)
    }
}

/// Reward weights and the adaptive cost-factor heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub response_time_weight: f64,
    pub cpu_memory_weight: f64,
    pub cost_weight: f64,
    /// Replica ratio above which an SLA breach eases cost pressure.
    pub cost_relief_ratio: f64,
    pub cost_relief_factor: f64,
    /// Replica ratio below which an SLA breach increases cost pressure.
    pub cost_pressure_ratio: f64,
    pub cost_pressure_factor: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            response_time_weight: 1.0,
            cpu_memory_weight: 0.5,
            cost_weight: 0.3,
            cost_relief_ratio: 0.6,
            cost_relief_factor: 0.5,
            cost_pressure_ratio: 0.3,
            cost_pressure_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub algorithm: Algorithm,
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub epsilon_start: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
    pub n_actions: usize,
    /// Weight of the fuzzy preference in the hybrid policies (0–1).
    pub fuzzy_weight: f64,
    /// Spread of the fuzzy preference across action indices.
    pub fuzziness_bandwidth: f64,
    /// Seed for exploration; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::QLearning,
            learning_rate: 0.1,
            discount_factor: 0.95,
            epsilon_start: 0.1,
            epsilon_decay: 0.99,
            epsilon_min: 0.01,
            n_actions: 100,
            fuzzy_weight: 0.3,
            fuzziness_bandwidth: 8.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: u32,
    /// Steps per episode.
    pub iteration: u32,
    pub note: String,
    pub checkpoint_dir: PathBuf,
    /// Save a periodic checkpoint every N episodes (0 disables).
    pub checkpoint_interval: u32,
    pub resume_path: Option<PathBuf>,
    /// Restore the configured starting epsilon after resuming.
    pub reset_epsilon: bool,
    pub epsilon_decay_override: Option<f64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            iteration: 10,
            note: "default".to_string(),
            checkpoint_dir: PathBuf::from("model"),
            checkpoint_interval: 0,
            resume_path: None,
            reset_epsilon: true,
            epsilon_decay_override: None,
        }
    }
}

/// Membership overrides for the fuzzy engine. Each entry holds the
/// trapezoid breakpoints `[a, b, c, d]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub cpu_usage: Option<LoadTermsConfig>,
    pub memory_usage: Option<LoadTermsConfig>,
    pub response_time: Option<LatencyTermsConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTermsConfig {
    pub low: [f64; 4],
    pub medium: [f64; 4],
    pub high: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyTermsConfig {
    pub fast: [f64; 4],
    pub normal: [f64; 4],
    pub slow: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub measurement: String,
    /// Append points as JSON lines to this file; log-only when absent.
    pub jsonl_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            measurement: "autoscaler_metrics".to_string(),
            jsonl_path: None,
        }
    }
}

// ── Algorithm selector ────────────────────────────────────────────

/// Which policy drives the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    /// Tabular Q-learning over discretized observations.
    QLearning,
    /// Q-values blended with a fuzzy preference distribution.
    FuzzyHybrid,
    /// Three-point fuzzy override on top of tabular Q-learning.
    FuzzyOverride,
}

impl Algorithm {
    /// Canonical selector string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QLearning => "Q",
            Self::FuzzyHybrid => "Q-FUZZY",
            Self::FuzzyOverride => "Q-FUZZY-OVERRIDE",
        }
    }

    /// Directory name used for checkpoint layout.
    pub fn model_dir(&self) -> &'static str {
        match self {
            Self::QLearning => "qlearning",
            Self::FuzzyHybrid => "qfuzzyhybrid",
            Self::FuzzyOverride => "qfuzzyoverride",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q" => Ok(Self::QLearning),
            "Q-FUZZY" | "QFUZZYHYBRID" | "Q_FUZZY" => Ok(Self::FuzzyHybrid),
            "Q-FUZZY-OVERRIDE" | "Q_FUZZY_OVERRIDE" => Ok(Self::FuzzyOverride),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl TryFrom<String> for Algorithm {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Loading and validation ────────────────────────────────────────

impl ControllerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config for the given workload with every default spelled out.
    pub fn scaffold(namespace: &str, name: &str) -> Self {
        ControllerConfig {
            workload: WorkloadConfig {
                namespace: namespace.to_string(),
                name: name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Reject configurations the controller cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let w = &self.workload;
        if w.min_replicas > w.max_replicas {
            return Err(ConfigError::invalid(
                "workload.min_replicas",
                format!("{} exceeds max_replicas {}", w.min_replicas, w.max_replicas),
            ));
        }

        let b = &self.bounds;
        check_bound_pair("bounds.cpu", b.min_cpu, b.max_cpu)?;
        check_bound_pair("bounds.memory", b.min_memory, b.max_memory)?;
        if !b.max_response_time.is_finite() || b.max_response_time <= 0.0 {
            return Err(ConfigError::invalid(
                "bounds.max_response_time",
                "must be positive",
            ));
        }

        let a = &self.agent;
        if !(a.learning_rate > 0.0 && a.learning_rate <= 1.0) {
            return Err(ConfigError::invalid("agent.learning_rate", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&a.discount_factor) {
            return Err(ConfigError::invalid("agent.discount_factor", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&a.epsilon_start) || !(0.0..=1.0).contains(&a.epsilon_min) {
            return Err(ConfigError::invalid("agent.epsilon", "must be in [0, 1]"));
        }
        if !in_unit_interval(a.epsilon_decay) {
            return Err(ConfigError::invalid("agent.epsilon_decay", "must be in (0, 1]"));
        }
        if let Some(decay) = self.training.epsilon_decay_override {
            if !in_unit_interval(decay) {
                return Err(ConfigError::invalid(
                    "training.epsilon_decay_override",
                    "must be in (0, 1]",
                ));
            }
        }
        if a.n_actions == 0 {
            return Err(ConfigError::invalid("agent.n_actions", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&a.fuzzy_weight) {
            return Err(ConfigError::invalid("agent.fuzzy_weight", "must be in [0, 1]"));
        }
        if !a.fuzziness_bandwidth.is_finite() || a.fuzziness_bandwidth <= 0.0 {
            return Err(ConfigError::invalid(
                "agent.fuzziness_bandwidth",
                "must be positive",
            ));
        }

        // Surface bad duration strings at startup rather than mid-run.
        self.timing.timeout()?;
        self.timing.wait_time()?;
        self.timing.metrics_interval()?;
        self.timing.readiness_poll_interval()?;
        self.scaling.base_timeout()?;
        self.scaling.max_timeout()?;
        self.scaling.base_delay()?;
        self.scaling.max_delay()?;
        Ok(())
    }
}

/// `(0, 1]`, rejecting NaN.
fn in_unit_interval(x: f64) -> bool {
    x > 0.0 && x <= 1.0
}

fn check_bound_pair(field: &'static str, min: f64, max: f64) -> ConfigResult<()> {
    // The reward divides by `min` and by `100 - max`.
    if !(min > 0.0 && max < 100.0 && min <= max) {
        return Err(ConfigError::invalid(
            field,
            format!("expected 0 < min <= max < 100, got {min}..{max}"),
        ));
    }
    Ok(())
}

fn parse_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::Duration {
        field,
        value: value.to_string(),
    })
}

/// Parse a duration string like "5s", "500ms", "2m". A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
