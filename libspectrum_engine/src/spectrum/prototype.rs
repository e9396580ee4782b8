use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::calibration::{Axis, Calibration};
use crate::coincidence::{ChannelConfig, ChannelPattern};
use crate::dataspace::StorageKind;
use crate::error::PrototypeError;
use crate::filter::FilterConfig;
use crate::setting::Settings;

/// The binning rule of a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SpectrumKind {
    Counter,
    Histogram1D,
    Histogram2D,
    Histogram3D,
    Image,
    TimeOfFlight,
    TimeOfFlightValue,
    TimeDelta,
    RateWindow,
    Coincidence1D,
    Coincidence2D,
}

impl SpectrumKind {
    /// Number of value latches the kind needs
    pub fn value_count(&self) -> usize {
        match self {
            Self::Counter | Self::TimeOfFlight | Self::TimeDelta | Self::RateWindow => 0,
            Self::Histogram1D
            | Self::TimeOfFlightValue
            | Self::Coincidence1D
            | Self::Coincidence2D => 1,
            Self::Histogram2D => 2,
            Self::Histogram3D | Self::Image => 3,
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::Counter => 0,
            Self::Histogram1D
            | Self::TimeOfFlight
            | Self::TimeDelta
            | Self::RateWindow
            | Self::Coincidence1D => 1,
            Self::Histogram2D | Self::Image | Self::TimeOfFlightValue | Self::Coincidence2D => 2,
            Self::Histogram3D => 3,
        }
    }

    pub fn default_storage(&self) -> StorageKind {
        match self {
            Self::Counter => StorageKind::Scalar,
            Self::Image => StorageKind::DenseMatrix,
            Self::Histogram2D | Self::TimeOfFlightValue | Self::Coincidence2D => {
                StorageKind::SparseMatrix
            }
            _ => StorageKind::SparseMap,
        }
    }

    /// Kinds that bin on time and need a non-zero resolution
    pub fn is_timed(&self) -> bool {
        matches!(
            self,
            Self::TimeOfFlight | Self::TimeOfFlightValue | Self::TimeDelta | Self::RateWindow
        )
    }
}

impl Display for SpectrumKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::Histogram1D => "histogram1d",
            Self::Histogram2D => "histogram2d",
            Self::Histogram3D => "histogram3d",
            Self::Image => "image",
            Self::TimeOfFlight => "time_of_flight",
            Self::TimeOfFlightValue => "time_of_flight_value",
            Self::TimeDelta => "time_delta",
            Self::RateWindow => "rate_window",
            Self::Coincidence1D => "coincidence1d",
            Self::Coincidence2D => "coincidence2d",
        };
        write!(f, "{name}")
    }
}

impl FromStr for SpectrumKind {
    type Err = PrototypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(Self::Counter),
            "histogram1d" => Ok(Self::Histogram1D),
            "histogram2d" => Ok(Self::Histogram2D),
            "histogram3d" => Ok(Self::Histogram3D),
            "image" => Ok(Self::Image),
            "time_of_flight" => Ok(Self::TimeOfFlight),
            "time_of_flight_value" => Ok(Self::TimeOfFlightValue),
            "time_delta" => Ok(Self::TimeDelta),
            "rate_window" => Ok(Self::RateWindow),
            "coincidence1d" => Ok(Self::Coincidence1D),
            "coincidence2d" => Ok(Self::Coincidence2D),
            _ => Err(PrototypeError::UnknownKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for SpectrumKind {
    type Error = PrototypeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpectrumKind> for String {
    fn from(value: SpectrumKind) -> Self {
        value.to_string()
    }
}

/// Power of ten unit that `time_resolution` is expressed in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnits {
    #[default]
    Ns,
    Us,
    Ms,
    S,
}

impl TimeUnits {
    pub fn nanoseconds(&self) -> f64 {
        match self {
            Self::Ns => 1.0,
            Self::Us => 1.0e3,
            Self::Ms => 1.0e6,
            Self::S => 1.0e9,
        }
    }
}

impl Display for TimeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ns => "ns",
            Self::Us => "us",
            Self::Ms => "ms",
            Self::S => "s",
        };
        write!(f, "{name}")
    }
}

impl FromStr for TimeUnits {
    type Err = PrototypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" => Ok(Self::Ns),
            "us" => Ok(Self::Us),
            "ms" => Ok(Self::Ms),
            "s" => Ok(Self::S),
            _ => Err(PrototypeError::UnknownTimeUnits(s.to_string())),
        }
    }
}

/// One latched value: its name, down-sample bits and axis calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueConfig {
    pub value_id: String,
    #[serde(default)]
    pub downsample: u8,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub calibration: Calibration,
    #[serde(default)]
    pub units: String,
}

impl ValueConfig {
    pub fn new(value_id: &str, downsample: u8) -> Self {
        Self {
            value_id: value_id.to_string(),
            downsample,
            calibration: Calibration::default(),
            units: String::new(),
        }
    }

    pub fn axis(&self) -> Axis {
        Axis::new(self.calibration.clone(), self.downsample, &self.units)
    }
}

fn default_resolution() -> f64 {
    1.0
}

/// Strongly typed configuration of one spectrum.
///
/// This is what the YAML project configuration deserializes into, and what a
/// spectrum is rebuilt from when a project is opened. Conversion to and from the
/// flat [`Settings`] tree only happens at the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPrototype {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SpectrumKind,
    pub stream_id: String,
    #[serde(default)]
    pub reference_stream_id: Option<String>,
    #[serde(default)]
    pub values: Vec<ValueConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default = "default_resolution")]
    pub time_resolution: f64,
    #[serde(default)]
    pub time_units: TimeUnits,
    #[serde(default)]
    pub window: f64,
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub max_lookback: f64,
    #[serde(default)]
    pub coinc_window: f64,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub pattern_coinc: ChannelPattern,
    #[serde(default)]
    pub pattern_anti: ChannelPattern,
    #[serde(default)]
    pub pattern_add: ChannelPattern,
    #[serde(default)]
    pub storage: Option<StorageKind>,
}

impl SpectrumPrototype {
    pub fn new(name: &str, kind: SpectrumKind, stream_id: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            stream_id: stream_id.to_string(),
            reference_stream_id: None,
            values: Vec::new(),
            filters: Vec::new(),
            time_resolution: default_resolution(),
            time_units: TimeUnits::default(),
            window: 0.0,
            trim: false,
            max_lookback: 0.0,
            coinc_window: 0.0,
            channels: Vec::new(),
            pattern_coinc: ChannelPattern::default(),
            pattern_anti: ChannelPattern::default(),
            pattern_add: ChannelPattern::default(),
            storage: None,
        }
    }

    /// Builder flavor to append a value latch
    pub fn with_value(mut self, value_id: &str, downsample: u8) -> Self {
        self.values.push(ValueConfig::new(value_id, downsample));
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.storage.unwrap_or_else(|| self.kind.default_storage())
    }

    /// Time bins per nanosecond
    pub fn resolution_per_ns(&self) -> f64 {
        self.time_resolution / self.time_units.nanoseconds()
    }

    /// Axis of a time binned dimension, in `time_units`
    pub fn time_axis(&self) -> Axis {
        let slope = if self.time_resolution > 0.0 {
            1.0 / self.time_resolution
        } else {
            0.0
        };
        Axis::new(
            Calibration::affine(0.0, slope),
            0,
            &self.time_units.to_string(),
        )
    }

    fn value_axis(&self, idx: usize) -> Axis {
        self.values
            .get(idx)
            .map(|v| v.axis())
            .unwrap_or_default()
    }

    /// One axis per dimension of the kind
    pub fn axes(&self) -> Vec<Axis> {
        match self.kind {
            SpectrumKind::Counter => Vec::new(),
            SpectrumKind::Histogram1D | SpectrumKind::Coincidence1D => vec![self.value_axis(0)],
            SpectrumKind::Histogram2D | SpectrumKind::Image => {
                vec![self.value_axis(0), self.value_axis(1)]
            }
            SpectrumKind::Histogram3D => {
                vec![self.value_axis(0), self.value_axis(1), self.value_axis(2)]
            }
            SpectrumKind::Coincidence2D => vec![self.value_axis(0), self.value_axis(0)],
            SpectrumKind::TimeOfFlight | SpectrumKind::TimeDelta | SpectrumKind::RateWindow => {
                vec![self.time_axis()]
            }
            SpectrumKind::TimeOfFlightValue => vec![self.time_axis(), self.value_axis(0)],
        }
    }

    /// Would switching to other invalidate the accumulated data?
    pub fn changes_dimensions(&self, other: &SpectrumPrototype) -> bool {
        self.kind != other.kind
            || self.storage_kind() != other.storage_kind()
            || self.values.len() != other.values.len()
            || self
                .values
                .iter()
                .zip(other.values.iter())
                .any(|(a, b)| a.value_id != b.value_id || a.downsample != b.downsample)
            || (self.kind.is_timed()
                && (self.resolution_per_ns() != other.resolution_per_ns()
                    || self.window != other.window))
    }

    /// Flatten into the boundary configuration tree
    pub fn to_settings(&self) -> Settings {
        let mut s = Settings::new();
        s.set("name", self.name.as_str());
        s.set("type", self.kind.to_string());
        s.set("stream_id", self.stream_id.as_str());
        if let Some(reference) = &self.reference_stream_id {
            s.set("reference_stream_id", reference.as_str());
        }
        s.set("value_count", self.values.len() as i64);
        for (idx, value) in self.values.iter().enumerate() {
            s.set(&Settings::key("value_id", idx), value.value_id.as_str());
            s.set(&Settings::key("downsample", idx), value.downsample as i64);
            s.set(&Settings::key("calibration", idx), value.calibration.to_string());
            s.set(&Settings::key("units", idx), value.units.as_str());
        }
        s.set("time_resolution", self.time_resolution);
        s.set("time_units", self.time_units.to_string());
        s.set("window", self.window);
        s.set("trim", self.trim);
        s.set("max_lookback", self.max_lookback);
        s.set("coinc_window", self.coinc_window);
        s.set("channel_count", self.channels.len() as i64);
        for (idx, channel) in self.channels.iter().enumerate() {
            s.set(&format!("channel.{idx}.delay_ns"), channel.delay_ns);
            s.set(&format!("channel.{idx}.cutoff_logic"), channel.cutoff_logic as i64);
        }
        s.set("pattern_coinc", self.pattern_coinc.to_string());
        s.set("pattern_anti", self.pattern_anti.to_string());
        s.set("pattern_add", self.pattern_add.to_string());
        s.set("filter_count", self.filters.len() as i64);
        for (idx, filter) in self.filters.iter().enumerate() {
            s.set(&format!("filter.{idx}.enabled"), filter.enabled);
            s.set(&format!("filter.{idx}.value_id"), filter.value_id.as_str());
            s.set(&format!("filter.{idx}.min"), filter.min as i64);
            s.set(&format!("filter.{idx}.max"), filter.max as i64);
        }
        s.set("storage", self.storage_kind().to_string());
        s
    }

    /// Rebuild from the boundary configuration tree.
    ///
    /// `name`, `type` and `stream_id` are required; everything else falls back
    /// to its default.
    pub fn from_settings(s: &Settings) -> Result<Self, PrototypeError> {
        let text = |key: &str| -> Result<String, PrototypeError> {
            s.get_text(key)
                .map(|t| t.to_string())
                .ok_or_else(|| PrototypeError::MissingKey(key.to_string()))
        };
        let count = |key: &str| -> Result<usize, PrototypeError> {
            match s.get_integer(key) {
                Some(n) if n >= 0 => Ok(n as usize),
                Some(n) => Err(PrototypeError::BadValue(key.to_string(), n.to_string())),
                None => Ok(0),
            }
        };
        let unsigned = |key: &str, default: i64| -> Result<i64, PrototypeError> {
            match s.get_integer(key) {
                Some(n) if n >= 0 => Ok(n),
                Some(n) => Err(PrototypeError::BadValue(key.to_string(), n.to_string())),
                None => Ok(default),
            }
        };

        let kind: SpectrumKind = text("type")?.parse()?;
        let mut proto = Self::new(&text("name")?, kind, &text("stream_id")?);
        proto.reference_stream_id = s.get_text("reference_stream_id").map(|t| t.to_string());

        for idx in 0..count("value_count")? {
            let value_id = text(&Settings::key("value_id", idx))?;
            let downsample = unsigned(&Settings::key("downsample", idx), 0)?;
            let mut value = ValueConfig::new(&value_id, downsample.min(u8::MAX as i64) as u8);
            if let Some(cal) = s.get_text(&Settings::key("calibration", idx)) {
                value.calibration = cal.parse()?;
            }
            if let Some(units) = s.get_text(&Settings::key("units", idx)) {
                value.units = units.to_string();
            }
            proto.values.push(value);
        }

        if let Some(res) = s.get_floating("time_resolution") {
            proto.time_resolution = res;
        }
        if let Some(units) = s.get_text("time_units") {
            proto.time_units = units.parse()?;
        }
        proto.window = s.get_floating("window").unwrap_or(0.0);
        proto.trim = s.get_bool("trim").unwrap_or(false);
        proto.max_lookback = s.get_floating("max_lookback").unwrap_or(0.0);
        proto.coinc_window = s.get_floating("coinc_window").unwrap_or(0.0);

        for idx in 0..count("channel_count")? {
            proto.channels.push(ChannelConfig {
                delay_ns: s
                    .get_floating(&format!("channel.{idx}.delay_ns"))
                    .unwrap_or(0.0),
                cutoff_logic: unsigned(&format!("channel.{idx}.cutoff_logic"), 0)? as u32,
            });
        }
        if let Some(p) = s.get_text("pattern_coinc") {
            proto.pattern_coinc = p.parse()?;
        }
        if let Some(p) = s.get_text("pattern_anti") {
            proto.pattern_anti = p.parse()?;
        }
        if let Some(p) = s.get_text("pattern_add") {
            proto.pattern_add = p.parse()?;
        }

        for idx in 0..count("filter_count")? {
            proto.filters.push(FilterConfig {
                enabled: s.get_bool(&format!("filter.{idx}.enabled")).unwrap_or(true),
                value_id: text(&format!("filter.{idx}.value_id"))?,
                min: unsigned(&format!("filter.{idx}.min"), 0)?.min(u32::MAX as i64) as u32,
                max: unsigned(&format!("filter.{idx}.max"), u32::MAX as i64)?
                    .min(u32::MAX as i64) as u32,
            });
        }

        if let Some(storage) = s.get_text("storage") {
            proto.storage = Some(storage.parse()?);
        }
        Ok(proto)
    }
}
