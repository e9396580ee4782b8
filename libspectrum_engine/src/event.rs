use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Conversion from a producer's native clock ticks to nanoseconds.
///
/// `ns = ticks * multiplier / divider`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub multiplier: u32,
    pub divider: u32,
}

impl Default for TimeBase {
    fn default() -> Self {
        Self {
            multiplier: 1,
            divider: 1,
        }
    }
}

impl TimeBase {
    pub fn new(multiplier: u32, divider: u32) -> Self {
        Self {
            multiplier,
            divider,
        }
    }

    /// Convert native ticks to nanoseconds. A zero divider yields zero.
    pub fn to_nanoseconds(&self, ticks: u64) -> f64 {
        if self.divider == 0 {
            return 0.0;
        }
        ticks as f64 * self.multiplier as f64 / self.divider as f64
    }
}

/// EventModel is the schema for the Events of one stream.
///
/// It names the value and trace slots of an Event and carries the timebase of
/// the producer. Spectra resolve configured value names against it once per
/// spill.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventModel {
    #[serde(default)]
    pub timebase: TimeBase,
    #[serde(default)]
    pub values: FxHashMap<String, usize>,
    #[serde(default)]
    pub traces: FxHashMap<String, usize>,
}

impl EventModel {
    pub fn new(timebase: TimeBase) -> Self {
        Self {
            timebase,
            ..Default::default()
        }
    }

    /// Register a value name at the next free index
    pub fn add_value(&mut self, name: &str) -> usize {
        let idx = self.values.len();
        self.values.insert(name.to_string(), idx);
        idx
    }

    /// Register a trace name at the next free index
    pub fn add_trace(&mut self, name: &str) -> usize {
        let idx = self.traces.len();
        self.traces.insert(name.to_string(), idx);
        idx
    }

    /// Builder flavor of add_value
    pub fn with_value(mut self, name: &str) -> Self {
        self.add_value(name);
        self
    }

    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.values.get(name).copied()
    }

    pub fn trace_index(&self, name: &str) -> Option<usize> {
        self.traces.get(name).copied()
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// A single detector hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub channel: i16,
    pub timestamp: u64,
    #[serde(default)]
    pub values: Vec<u32>,
    #[serde(default)]
    pub traces: Vec<Vec<u16>>,
}

impl Event {
    pub fn new(channel: i16, timestamp: u64, values: Vec<u32>) -> Self {
        Self {
            channel,
            timestamp,
            values,
            traces: Vec::new(),
        }
    }

    pub fn value(&self, idx: usize) -> Option<u32> {
        self.values.get(idx).copied()
    }

    pub fn trace(&self, idx: usize) -> Option<&[u16]> {
        self.traces.get(idx).map(|t| t.as_slice())
    }

    /// Event time in nanoseconds under the given timebase
    pub fn time_ns(&self, timebase: &TimeBase) -> f64 {
        timebase.to_nanoseconds(self.timestamp)
    }
}
