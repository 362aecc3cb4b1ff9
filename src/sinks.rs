use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::game_log::{KillEvent, StatsLabels};

/// Outbound collaborators fed by the monitoring worker.
///
/// Calls are made synchronously and in log order. Implementations handle
/// their own failures; nothing is reported back to the worker.
pub trait EventSink: Send {
    fn submit_kill(&mut self, event: &KillEvent);

    fn play_kill_cue(&mut self) {}

    fn update_stats(&mut self, _labels: &StatsLabels) {}

    fn update_vehicle(&mut self, _vehicle: &str) {}
}

/// Writes everything to the tracing subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn submit_kill(&mut self, event: &KillEvent) {
        tracing::debug!(
            outcome = event.outcome.as_str(),
            killer = %event.killer,
            victim = %event.victim,
            weapon = %event.weapon,
            zone = %event.zone,
            "Kill event submitted"
        );
    }

    fn play_kill_cue(&mut self) {
        tracing::debug!("Kill cue");
    }

    fn update_stats(&mut self, labels: &StatsLabels) {
        tracing::info!(
            current_killstreak = %labels.current_killstreak,
            max_killstreak = %labels.max_killstreak,
            kills = %labels.session_kills,
            deaths = %labels.session_deaths,
            kd = %labels.kd_ratio,
            "Session stats updated"
        );
    }

    fn update_vehicle(&mut self, vehicle: &str) {
        tracing::debug!(vehicle = %vehicle, "Vehicle status updated");
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordedKill<'a> {
    recorded_at: String,
    #[serde(flatten)]
    event: &'a KillEvent,
}

/// Appends each submitted kill as one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonLinesKillSink {
    path: PathBuf,
}

impl JsonLinesKillSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn append(&self, event: &KillEvent) -> Result<(), String> {
        if let Some(parent_directory) = self.path.parent() {
            if !parent_directory.as_os_str().is_empty() {
                std::fs::create_dir_all(parent_directory).map_err(|error| {
                    format!(
                        "Failed to create kill log directory '{}': {error}",
                        parent_directory.display()
                    )
                })?;
            }
        }

        let record = RecordedKill {
            recorded_at: chrono::Utc::now().to_rfc3339(),
            event,
        };
        let serialized = serde_json::to_string(&record)
            .map_err(|error| format!("Failed to serialize kill event: {error}"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|error| {
                format!("Failed to open kill log '{}': {error}", self.path.display())
            })?;
        writeln!(file, "{serialized}").map_err(|error| {
            format!("Failed to append to kill log '{}': {error}", self.path.display())
        })
    }
}

impl EventSink for JsonLinesKillSink {
    fn submit_kill(&mut self, event: &KillEvent) {
        if let Err(error) = self.append(event) {
            tracing::warn!(outcome = event.outcome.as_str(), "{error}");
        }
    }
}

/// Fans every call out to each sink in registration order.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn EventSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for SinkSet {
    fn submit_kill(&mut self, event: &KillEvent) {
        for sink in &mut self.sinks {
            sink.submit_kill(event);
        }
    }

    fn play_kill_cue(&mut self) {
        for sink in &mut self.sinks {
            sink.play_kill_cue();
        }
    }

    fn update_stats(&mut self, labels: &StatsLabels) {
        for sink in &mut self.sinks {
            sink.update_stats(labels);
        }
    }

    fn update_vehicle(&mut self, vehicle: &str) {
        for sink in &mut self.sinks {
            sink.update_vehicle(vehicle);
        }
    }
}
