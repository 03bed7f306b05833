//! Per-step telemetry points and the sinks that receive them.
//!
//! Writes are fire-and-forget: a sink logs its own failures and never
//! surfaces them to the control loop.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rlscale_core::{StepInfo, WorkloadRef};

/// A single measurement in line-protocol shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    /// Unix epoch milliseconds; the sink's clock when absent.
    pub timestamp_ms: Option<u64>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ms: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Non-finite values are dropped.
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        if value.is_finite() {
            self.fields.insert(key.into(), value);
        }
        self
    }

    pub fn timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// The point recorded after every environment step.
    pub fn from_step(measurement: &str, workload: &WorkloadRef, info: &StepInfo) -> Self {
        Self::new(measurement)
            .tag("deployment", &workload.name)
            .tag("namespace", &workload.namespace)
            .field("cpu_usage", info.cpu_usage)
            .field("memory_usage", info.memory_usage)
            .field("response_time", info.response_time_ms)
            .field("replicas", f64::from(info.replica_state))
            .field("ready_replicas", f64::from(info.ready_replicas))
            .field("last_action", info.last_action as f64)
            .field("reward", info.reward)
            .timestamp_ms(epoch_millis())
    }
}

pub trait TelemetrySink: Send + Sync {
    fn write_point(&self, point: &Point);
}

/// Emits points as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn write_point(&self, point: &Point) {
        if point.fields.is_empty() {
            warn!(measurement = %point.measurement, "dropping telemetry point without fields");
            return;
        }
        let tags = serde_json::to_string(&point.tags).unwrap_or_default();
        let fields = serde_json::to_string(&point.fields).unwrap_or_default();
        debug!(
            measurement = %point.measurement,
            tags = %tags,
            fields = %fields,
            "telemetry point"
        );
    }
}

/// Appends points to a file, one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TelemetrySink for JsonLinesSink {
    fn write_point(&self, point: &Point) {
        if point.fields.is_empty() {
            warn!(measurement = %point.measurement, "dropping telemetry point without fields");
            return;
        }
        let mut point = point.clone();
        point.timestamp_ms.get_or_insert_with(epoch_millis);

        let line = match serde_json::to_string(&point) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode telemetry point");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let written = writeln!(writer, "{line}").and_then(|()| writer.flush());
        if let Err(e) = written {
            warn!(path = %self.path.display(), error = %e, "failed to write telemetry point");
        }
    }
}

/// Fans a point out to several sinks.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl TelemetrySink for MultiSink {
    fn write_point(&self, point: &Point) {
        for sink in &self.sinks {
            sink.write_point(point);
        }
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StepInfo {
        StepInfo {
            iteration: 3,
            action: 40,
            reward: 0.5,
            terminated: false,
            replica_state: 5,
            ready_replicas: 4,
            cpu_usage: 61.0,
            memory_usage: 42.0,
            response_time: 80.0,
            response_time_ms: 80.0,
            last_action: 40,
        }
    }

    #[test]
    fn step_point_has_expected_shape() {
        let point = Point::from_step("autoscaler_metrics", &WorkloadRef::new("shop", "api"), &info());
        assert_eq!(point.measurement, "autoscaler_metrics");
        assert_eq!(point.tags["deployment"], "api");
        assert_eq!(point.tags["namespace"], "shop");
        assert_eq!(point.fields["replicas"], 5.0);
        assert_eq!(point.fields["last_action"], 40.0);
        assert_eq!(point.fields["reward"], 0.5);
        assert!(point.timestamp_ms.is_some());
    }

    #[test]
    fn json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry/points.jsonl");
        let sink = JsonLinesSink::open(&path).unwrap();

        let point = Point::new("m").tag("k", "v").field("x", 1.5);
        sink.write_point(&point);
        sink.write_point(&point.clone().field("y", 2.0));
        sink.write_point(&Point::new("empty"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Point> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].fields["x"], 1.5);
        assert_eq!(lines[1].fields["y"], 2.0);
        assert!(lines[0].timestamp_ms.is_some());
    }

    #[test]
    fn multi_sink_fans_out() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");
        let sink = MultiSink::new()
            .with(LogSink)
            .with(JsonLinesSink::open(&a).unwrap())
            .with(JsonLinesSink::open(&b).unwrap());
        sink.write_point(&Point::new("m").field("x", 1.0));

        for path in [a, b] {
            assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1);
        }
    }
}
