use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::SpillFileError;
use super::event::{Event, EventModel};
use super::setting::Settings;

/// State key carrying the producer clock at the end of the spill, in ns
pub const NATIVE_TIME_KEY: &str = "native_time";
/// State key carrying the accumulated live time, in ns
pub const LIVE_TIME_KEY: &str = "live_time";
/// State key carrying the most recent pulse time, in ns
pub const PULSE_TIME_KEY: &str = "pulse_time";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpillKind {
    Start,
    #[default]
    Running,
    Stop,
    DaqStatus,
}

/// A Spill is one delivered batch of events for one stream, plus a snapshot of
/// the producer's state.
///
/// Spills are shared read-only between every Spectrum of a Project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spill {
    pub stream_id: String,
    #[serde(default)]
    pub kind: SpillKind,
    #[serde(default)]
    pub event_model: EventModel,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub state: Settings,
}

impl Spill {
    /// A run-start spill. Never carries events.
    pub fn start(stream_id: &str, event_model: EventModel, state: Settings) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            kind: SpillKind::Start,
            event_model,
            events: Vec::new(),
            state,
        }
    }

    /// A run-stop spill. Never carries events.
    pub fn stop(stream_id: &str, event_model: EventModel, state: Settings) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            kind: SpillKind::Stop,
            event_model,
            events: Vec::new(),
            state,
        }
    }

    pub fn running(stream_id: &str, event_model: EventModel, events: Vec<Event>) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            kind: SpillKind::Running,
            event_model,
            events,
            state: Settings::new(),
        }
    }

    /// Builder flavor to attach a state snapshot
    pub fn with_state(mut self, state: Settings) -> Self {
        self.state = state;
        self
    }

    /// Start and stop spills bracket a run
    pub fn is_boundary(&self) -> bool {
        matches!(self.kind, SpillKind::Start | SpillKind::Stop)
    }

    pub fn native_time(&self) -> Option<f64> {
        self.state.get_floating(NATIVE_TIME_KEY)
    }

    pub fn live_time(&self) -> Option<f64> {
        self.state.get_floating(LIVE_TIME_KEY)
    }

    pub fn pulse_time(&self) -> Option<f64> {
        self.state.get_floating(PULSE_TIME_KEY)
    }
}

/// Read a replay file: a YAML list of spills in delivery order
pub fn read_spill_file(path: &Path) -> Result<Vec<Spill>, SpillFileError> {
    if !path.exists() {
        return Err(SpillFileError::BadFilePath(path.to_path_buf()));
    }
    let yaml_str = std::fs::read_to_string(path)?;
    let mut spills = serde_yaml::from_str::<Vec<Spill>>(&yaml_str)?;
    for spill in spills.iter_mut().filter(|s| s.is_boundary()) {
        if !spill.events.is_empty() {
            spdlog::warn!(
                "Boundary spill for stream {} carried {} events; they were dropped",
                spill.stream_id,
                spill.events.len()
            );
            spill.events.clear();
        }
    }
    Ok(spills)
}
