//! Spectra: the per-histogram binning state machines.
//!
//! A [`Spectrum`] is built from a [`SpectrumPrototype`] and fed whole spills. It
//! accepts spills of its own stream, resolves its value names against the
//! spill's EventModel, filters events, turns them into coordinates with its
//! [`Binner`] and writes them into its [`Dataspace`].
//!
//! All mutable state sits behind one blocking reader-writer lock. A writer holds
//! it for a whole spill; readers (plots, exports, saves) hold it for one query.
pub mod binning;
pub mod prototype;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use std::io::Write;

use crate::dataspace::{Dataspace, Entry};
use crate::error::{ExportError, PrototypeError, SpectrumError};
use crate::event::{Event, EventModel, TimeBase};
use crate::filter::{FilterBlock, ValueLatch};
use crate::setting::Settings;
use crate::spill::{Spill, SpillKind};
use binning::Binner;
pub use prototype::{SpectrumKind, SpectrumPrototype, TimeUnits, ValueConfig};

pub const METADATA_GROUP: &str = "metadata";
pub const DATA_GROUP: &str = "data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
    /// No spill of the stream has been accepted since creation or reconfigure
    #[default]
    Unconfigured,
    /// Names are latched, nothing binned yet
    Ready,
    /// At least one event was binned
    Accumulating,
}

/// Run statistics derived from the spill state snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpectrumStats {
    pub events_seen: u64,
    pub events_accepted: u64,
    pub start_native_ns: Option<f64>,
    pub last_native_ns: Option<f64>,
    pub real_time_ns: f64,
    pub live_time_ns: f64,
    /// Accepted events per second over the most recent spill
    pub instant_rate: f64,
    pub pulse_time_ns: Option<f64>,
}

enum StreamRole {
    Primary,
    Reference,
}

struct SpectrumState {
    prototype: SpectrumPrototype,
    status: Status,
    latches: Vec<ValueLatch>,
    filters: FilterBlock,
    model: Option<EventModel>,
    binner: Binner,
    dataspace: Dataspace,
    stats: SpectrumStats,
    accepted_before_spill: u64,
}

impl SpectrumState {
    fn new(prototype: SpectrumPrototype) -> Self {
        let dataspace = Dataspace::new(prototype.storage_kind(), prototype.axes());
        let mut state = Self {
            status: Status::Unconfigured,
            latches: Vec::new(),
            filters: FilterBlock::default(),
            model: None,
            binner: Binner::new(&prototype),
            dataspace,
            stats: SpectrumStats::default(),
            accepted_before_spill: 0,
            prototype,
        };
        state.build_pipeline();
        state
    }

    /// Latches and filters from the prototype, all unresolved
    fn build_pipeline(&mut self) {
        self.latches = self
            .prototype
            .values
            .iter()
            .take(self.prototype.kind.value_count())
            .map(|v| ValueLatch::new(&v.value_id, v.downsample))
            .collect();
        self.filters = FilterBlock::new(&self.prototype.filters);
        self.binner = Binner::new(&self.prototype);
        self.model = None;
        self.status = Status::Unconfigured;
    }

    fn resolution(&self) -> f64 {
        self.prototype.resolution_per_ns()
    }

    fn stream_role(&self, stream_id: &str) -> Option<StreamRole> {
        if stream_id == self.prototype.stream_id {
            Some(StreamRole::Primary)
        } else if self.binner.uses_reference()
            && self.prototype.reference_stream_id.as_deref() == Some(stream_id)
        {
            Some(StreamRole::Reference)
        } else {
            None
        }
    }

    fn accept_spill(&mut self, spill: &Spill) -> bool {
        match self.stream_role(&spill.stream_id) {
            Some(StreamRole::Primary) => (),
            Some(StreamRole::Reference) => return true,
            None => return false,
        }
        if spill.kind != SpillKind::Running {
            return true;
        }
        if let Some(missing) = self
            .latches
            .iter()
            .find(|l| !spill.event_model.has_value(&l.value_id))
        {
            spdlog::debug!(
                "Spectrum {} skipped a spill of {}: value {} is not in the event model",
                self.prototype.name,
                spill.stream_id,
                missing.value_id
            );
            return false;
        }
        if self.model.as_ref() != Some(&spill.event_model) {
            for latch in self.latches.iter_mut() {
                latch.configure(&spill.event_model);
            }
            self.filters.configure(&spill.event_model);
            self.model = Some(spill.event_model.clone());
        }
        if self.status == Status::Unconfigured {
            self.status = Status::Ready;
        }
        true
    }

    fn accept_events(&self) -> bool {
        self.latches.len() == self.prototype.kind.value_count()
            && self.latches.iter().all(|l| l.valid())
            && (!self.prototype.kind.is_timed() || self.resolution() > 0.0)
            && self.binner.is_ready()
    }

    fn push_event(&mut self, event: &Event, timebase: &TimeBase) {
        self.stats.events_seen += 1;
        if !self.filters.accept(event) {
            return;
        }
        let resolution = self.resolution();
        let time_ns = event.time_ns(timebase);
        if self
            .binner
            .bin_event(event, time_ns, &self.latches, resolution, &mut self.dataspace)
        {
            self.stats.events_accepted += 1;
            self.status = Status::Accumulating;
        }
    }

    fn push_stats_pre(&mut self, spill: &Spill) {
        self.accepted_before_spill = self.stats.events_accepted;
        if let Some(native) = spill.native_time() {
            if spill.kind == SpillKind::Start || self.stats.start_native_ns.is_none() {
                self.stats.start_native_ns = Some(native);
                self.stats.last_native_ns = Some(native);
            }
        }
        if let Some(pulse) = spill.pulse_time() {
            self.stats.pulse_time_ns = Some(pulse);
        }
        self.binner.on_spill(spill);
    }

    fn push_stats_post(&mut self, spill: &Spill) {
        if let Some(native) = spill.native_time() {
            if let Some(start) = self.stats.start_native_ns {
                self.stats.real_time_ns = native - start;
            }
            if let Some(last) = self.stats.last_native_ns {
                if native > last {
                    let accepted = self.stats.events_accepted - self.accepted_before_spill;
                    self.stats.instant_rate = accepted as f64 / ((native - last) / 1.0e9);
                }
            }
            self.stats.last_native_ns = Some(native);
        }
        if let Some(live) = spill.live_time() {
            self.stats.live_time_ns = live;
        }
    }

    fn push_spill(&mut self, spill: &Spill) {
        if !self.accept_spill(spill) {
            return;
        }
        let resolution = self.resolution();
        if let Some(StreamRole::Reference) = self.stream_role(&spill.stream_id) {
            self.binner
                .push_reference(spill, resolution, &mut self.dataspace);
            self.dataspace.recalc_axes();
            return;
        }

        self.push_stats_pre(spill);
        if !spill.events.is_empty() {
            if self.accept_events() {
                for event in spill.events.iter() {
                    self.push_event(event, &spill.event_model.timebase);
                }
            } else {
                spdlog::debug!(
                    "Spectrum {} dropped {} events: configuration incomplete",
                    self.prototype.name,
                    spill.events.len()
                );
            }
        }
        self.binner.after_spill(resolution, &mut self.dataspace);
        self.push_stats_post(spill);
        self.dataspace.recalc_axes();
    }

    fn flush(&mut self) {
        let resolution = self.resolution();
        self.binner
            .flush(&self.latches, resolution, &mut self.dataspace);
        self.dataspace.recalc_axes();
    }

    fn clear(&mut self) {
        self.dataspace.clear();
        self.binner.reset();
        self.stats = SpectrumStats::default();
        self.accepted_before_spill = 0;
        if self.status == Status::Accumulating {
            self.status = Status::Ready;
        }
    }

    fn reconfigure(&mut self, prototype: SpectrumPrototype) {
        if self.prototype.changes_dimensions(&prototype) {
            spdlog::info!(
                "Spectrum {} changed shape; accumulated data was reset",
                self.prototype.name
            );
            *self = Self::new(prototype);
            return;
        }
        let axes = prototype.axes();
        for (dim, axis) in axes.into_iter().enumerate() {
            if let Some(current) = self.dataspace.axis_mut(dim) {
                current.units = axis.units;
                current.recalibrate(axis.calibration);
            }
        }
        self.prototype = prototype;
        self.build_pipeline();
    }

    fn metadata(&self) -> Settings {
        let mut settings = self.prototype.to_settings();
        settings.set("total_count", self.dataspace.total_count());
        settings.set("events_accepted", self.stats.events_accepted as i64);
        settings.set("instant_rate", self.stats.instant_rate);
        settings.set("real_time", self.stats.real_time_ns);
        settings.set("live_time", self.stats.live_time_ns);
        if let Some(coinc) = self.binner.coincidence_stats() {
            settings.set("pileups", coinc.pileups as i64);
            settings.set("coincidences_rejected", coinc.rejected as i64);
        }
        let uncorrelated = self.binner.uncorrelated();
        if uncorrelated > 0 {
            settings.set("uncorrelated", uncorrelated as i64);
        }
        settings
    }
}

/// One named histogram and everything needed to fill it.
pub struct Spectrum {
    name: String,
    state: RwLock<SpectrumState>,
}

impl Spectrum {
    pub fn new(prototype: SpectrumPrototype) -> Self {
        Self {
            name: prototype.name.clone(),
            state: RwLock::new(SpectrumState::new(prototype)),
        }
    }

    /// Rebuild from a persisted metadata tree
    pub fn from_settings(settings: &Settings) -> Result<Self, PrototypeError> {
        Ok(Self::new(SpectrumPrototype::from_settings(settings)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prototype(&self) -> SpectrumPrototype {
        self.state.read().prototype.clone()
    }

    pub fn status(&self) -> Status {
        self.state.read().status
    }

    pub fn stats(&self) -> SpectrumStats {
        self.state.read().stats
    }

    /// Offer a spill. Spills of other streams and spills lacking the latched
    /// value names are ignored.
    pub fn push_spill(&self, spill: &Spill) {
        self.state.write().push_spill(spill);
    }

    /// Bin everything still held back (coincidences, correlations, the last
    /// rate window bin)
    pub fn flush(&self) {
        self.state.write().flush();
    }

    /// Zero the data and run statistics, keeping the configuration
    pub fn clear(&self) {
        self.state.write().clear();
    }

    /// Apply a new prototype. Changes to kind, storage, latched values or the
    /// time binning reset the data; everything else keeps it.
    pub fn reconfigure(&self, mut prototype: SpectrumPrototype) {
        prototype.name = self.name.clone();
        self.state.write().reconfigure(prototype);
    }

    /// Shared access to the dataspace, held for as long as the guard lives
    pub fn data(&self) -> MappedRwLockReadGuard<'_, Dataspace> {
        RwLockReadGuard::map(self.state.read(), |s| &s.dataspace)
    }

    pub fn data_range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        self.state.read().dataspace.range(bounds)
    }

    pub fn axis_values(&self, dimension: usize) -> Vec<f64> {
        self.state.read().dataspace.axis_values(dimension)
    }

    /// Bin values of the bins `lo..=hi` along a dimension
    pub fn axis_values_in(&self, dimension: usize, lo: u32, hi: u32) -> Vec<f64> {
        self.state.read().dataspace.axis_values_in(dimension, lo, hi)
    }

    /// Configuration plus the derived read-only values
    pub fn metadata(&self) -> Settings {
        self.state.read().metadata()
    }

    pub fn export_csv<W: Write>(&self, writer: &mut W) -> Result<(), ExportError> {
        self.state.read().dataspace.export_csv(writer)
    }

    /// Write metadata and data sub-groups into the given group
    pub fn save(&self, group: &hdf5::Group) -> Result<(), SpectrumError> {
        let state = self.state.read();
        let metadata = group.create_group(METADATA_GROUP)?;
        state.metadata().write_attributes(&metadata)?;
        let data = group.create_group(DATA_GROUP)?;
        state.dataspace.save(&data)?;
        Ok(())
    }

    /// Build a spectrum from a saved group. The metadata sub-group is required.
    pub fn open(group: &hdf5::Group) -> Result<Self, SpectrumError> {
        let metadata = group.group(METADATA_GROUP)?;
        let settings = Settings::read_attributes(&metadata)?;
        let spectrum = Self::from_settings(&settings)?;
        spectrum.restore(group)?;
        Ok(spectrum)
    }

    /// Load saved data and run statistics into this spectrum.
    ///
    /// A missing data group or missing datasets load as empty.
    pub fn restore(&self, group: &hdf5::Group) -> Result<(), SpectrumError> {
        let mut state = self.state.write();
        if group.link_exists(DATA_GROUP) {
            let data = group.group(DATA_GROUP)?;
            state.dataspace.load(&data)?;
        } else {
            state.dataspace.clear();
        }
        if group.link_exists(METADATA_GROUP) {
            let settings = Settings::read_attributes(&group.group(METADATA_GROUP)?)?;
            if let Some(accepted) = settings.get_integer("events_accepted") {
                state.stats.events_accepted = accepted.max(0) as u64;
            }
            if let Some(real) = settings.get_floating("real_time") {
                state.stats.real_time_ns = real;
            }
            if let Some(live) = settings.get_floating("live_time") {
                state.stats.live_time_ns = live;
            }
        }
        if !state.dataspace.is_empty() {
            state.status = Status::Accumulating;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coincidence::{ChannelConfig, ChannelPattern};
    use crate::dataspace::StorageKind;
    use crate::filter::FilterConfig;
    use crate::spill::{LIVE_TIME_KEY, NATIVE_TIME_KEY, PULSE_TIME_KEY};

    fn model() -> EventModel {
        EventModel::new(TimeBase::default())
            .with_value("energy")
            .with_value("psd")
    }

    fn spill(events: Vec<Event>) -> Spill {
        Spill::running("adc", model(), events)
    }

    fn ev(channel: i16, timestamp: u64, energy: u32) -> Event {
        Event::new(channel, timestamp, vec![energy, 0])
    }

    #[test]
    fn test_histogram_downsample() {
        let spectrum = Spectrum::new(
            SpectrumPrototype::new("e", SpectrumKind::Histogram1D, "adc").with_value("energy", 2),
        );
        assert_eq!(spectrum.status(), Status::Unconfigured);
        spectrum.push_spill(&spill(vec![ev(0, 0, 0), ev(0, 1, 9), ev(0, 2, 11)]));
        assert_eq!(spectrum.status(), Status::Accumulating);
        let data = spectrum.data();
        assert_eq!(data.get(&[0]), 1.0);
        assert_eq!(data.get(&[2]), 2.0);
        assert_eq!(data.total_count(), 3.0);
    }

    #[test]
    fn test_missing_value_name_skips_spill() {
        let spectrum = Spectrum::new(
            SpectrumPrototype::new("e", SpectrumKind::Histogram1D, "adc").with_value("charge", 0),
        );
        spectrum.push_spill(&spill(vec![ev(0, 0, 1)]));
        assert_eq!(spectrum.status(), Status::Unconfigured);
        assert!(spectrum.data().is_empty());
        assert!(spectrum.data_range(&[]).is_empty());
    }

    #[test]
    fn test_other_stream_ignored() {
        let spectrum = Spectrum::new(SpectrumPrototype::new("e", SpectrumKind::Counter, "adc"));
        spectrum.push_spill(&Spill::running("tdc", model(), vec![ev(0, 0, 1)]));
        assert_eq!(spectrum.data().total_count(), 0.0);
        spectrum.push_spill(&spill(vec![ev(0, 0, 1), ev(0, 0, 2)]));
        assert_eq!(spectrum.data().get(&[]), 2.0);
    }

    #[test]
    fn test_filters_see_full_resolution() {
        let proto = SpectrumPrototype::new("e", SpectrumKind::Histogram1D, "adc")
            .with_value("energy", 3)
            .with_filter(FilterConfig {
                enabled: true,
                value_id: String::from("energy"),
                min: 10,
                max: 20,
            });
        let spectrum = Spectrum::new(proto);
        spectrum.push_spill(&spill(vec![ev(0, 0, 9), ev(0, 0, 16), ev(0, 0, 21)]));
        assert_eq!(spectrum.data_range(&[]), vec![Entry::new(vec![2], 1.0)]);
        assert_eq!(spectrum.stats().events_seen, 3);
        assert_eq!(spectrum.stats().events_accepted, 1);
    }

    #[test]
    fn test_event_model_change_relatches() {
        let spectrum = Spectrum::new(
            SpectrumPrototype::new("p", SpectrumKind::Histogram1D, "adc").with_value("psd", 0),
        );
        spectrum.push_spill(&spill(vec![Event::new(0, 0, vec![1, 5])]));
        let swapped = EventModel::new(TimeBase::default())
            .with_value("psd")
            .with_value("energy");
        spectrum.push_spill(&Spill::running("adc", swapped, vec![Event::new(0, 0, vec![5, 1])]));
        assert_eq!(spectrum.data().get(&[5]), 2.0);
    }

    #[test]
    fn test_image_weights() {
        let proto = SpectrumPrototype::new("img", SpectrumKind::Image, "cam")
            .with_value("x", 0)
            .with_value("y", 0)
            .with_value("i", 0);
        let spectrum = Spectrum::new(proto);
        let model = EventModel::new(TimeBase::default())
            .with_value("x")
            .with_value("y")
            .with_value("i");
        spectrum.push_spill(&Spill::running(
            "cam",
            model,
            vec![Event::new(0, 0, vec![1, 2, 7]), Event::new(0, 0, vec![1, 2, 3])],
        ));
        let data = spectrum.data();
        assert_eq!(data.kind(), StorageKind::DenseMatrix);
        assert_eq!(data.get(&[1, 2]), 10.0);
    }

    #[test]
    fn test_time_of_flight_from_spill_state() {
        let mut proto = SpectrumPrototype::new("tof", SpectrumKind::TimeOfFlight, "adc");
        proto.time_resolution = 0.1;
        let spectrum = Spectrum::new(proto);
        spectrum.push_spill(&spill(vec![ev(0, 1000, 1)]));
        assert!(spectrum.data().is_empty());
        let pulsed = spill(vec![ev(0, 1025, 1), ev(0, 990, 1)])
            .with_state(Settings::new().with(PULSE_TIME_KEY, 1000.0));
        spectrum.push_spill(&pulsed);
        assert_eq!(spectrum.data_range(&[]), vec![Entry::new(vec![2], 1.0)]);
    }

    #[test]
    fn test_time_of_flight_against_reference_stream() {
        let mut proto = SpectrumPrototype::new("tof", SpectrumKind::TimeOfFlightValue, "adc")
            .with_value("energy", 0);
        proto.reference_stream_id = Some(String::from("chopper"));
        let spectrum = Spectrum::new(proto);
        spectrum.push_spill(&spill(vec![ev(0, 150, 4), ev(0, 260, 5)]));
        spectrum.push_spill(&Spill::running(
            "chopper",
            EventModel::default(),
            vec![Event::new(0, 100, vec![]), Event::new(0, 200, vec![])],
        ));
        assert_eq!(spectrum.data().get(&[50, 4]), 1.0);
        assert_eq!(spectrum.data().total_count(), 1.0);
        spectrum.flush();
        assert_eq!(spectrum.data().get(&[60, 5]), 1.0);
    }

    #[test]
    fn test_time_delta_across_spills() {
        let spectrum = Spectrum::new(SpectrumPrototype::new("dt", SpectrumKind::TimeDelta, "adc"));
        spectrum.push_spill(&spill(vec![ev(0, 10, 0), ev(0, 15, 0)]));
        spectrum.push_spill(&spill(vec![ev(0, 22, 0)]));
        assert_eq!(
            spectrum.data_range(&[]),
            vec![Entry::new(vec![5], 1.0), Entry::new(vec![7], 1.0)]
        );
        assert_eq!(spectrum.stats().events_accepted, 2);
    }

    #[test]
    fn test_wide_time_delta_keeps_axis_small() {
        let spectrum = Spectrum::new(SpectrumPrototype::new("dt", SpectrumKind::TimeDelta, "adc"));
        spectrum.push_spill(&spill(vec![ev(0, 0, 0), ev(0, 300_000_000, 0)]));
        assert_eq!(spectrum.data().get(&[300_000_000]), 1.0);
        assert_eq!(spectrum.data().axis(0).map(|a| a.size()), Some(300_000_001));
        assert_eq!(spectrum.axis_values_in(0, 300_000_000, u32::MAX), vec![3.0e8]);
    }

    #[test]
    fn test_oversized_downsample_accepts_nothing() {
        let spectrum = Spectrum::new(
            SpectrumPrototype::new("e", SpectrumKind::Histogram1D, "adc").with_value("energy", 64),
        );
        spectrum.push_spill(&spill(vec![ev(0, 0, 5)]));
        spectrum.flush();
        assert!(spectrum.data().is_empty());
        assert_eq!(spectrum.stats().events_accepted, 0);
        assert_eq!(spectrum.metadata().get_integer("downsample.0"), Some(64));
    }

    #[test]
    fn test_run_statistics() {
        let spectrum = Spectrum::new(SpectrumPrototype::new("n", SpectrumKind::Counter, "adc"));
        spectrum.push_spill(&Spill::start(
            "adc",
            model(),
            Settings::new().with(NATIVE_TIME_KEY, 1.0e9),
        ));
        spectrum.push_spill(&spill(vec![ev(0, 0, 0); 4]).with_state(
            Settings::new()
                .with(NATIVE_TIME_KEY, 3.0e9)
                .with(LIVE_TIME_KEY, 1.5e9),
        ));
        let stats = spectrum.stats();
        assert_eq!(stats.real_time_ns, 2.0e9);
        assert_eq!(stats.live_time_ns, 1.5e9);
        assert_eq!(stats.instant_rate, 2.0);
        let meta = spectrum.metadata();
        assert_eq!(meta.get_integer("events_accepted"), Some(4));
        assert_eq!(meta.get_floating("total_count"), Some(4.0));
    }

    #[test]
    fn test_coincidence_end_to_end() {
        let mut proto = SpectrumPrototype::new("c", SpectrumKind::Coincidence1D, "adc")
            .with_value("energy", 0);
        proto.coinc_window = 10.0;
        proto.channels = vec![ChannelConfig::default(); 2];
        proto.pattern_coinc = "11".parse().unwrap();
        proto.pattern_add = "11".parse().unwrap();
        let spectrum = Spectrum::new(proto);
        spectrum.push_spill(&spill(vec![ev(0, 0, 2), ev(1, 5, 2)]));
        assert_eq!(spectrum.data().total_count(), 0.0);
        spectrum.flush();
        spectrum.flush();
        assert_eq!(spectrum.data().get(&[2]), 2.0);
        assert_eq!(spectrum.data().total_count(), 2.0);
    }

    #[test]
    fn test_coincidence_cutoff_and_2d() {
        let mut proto = SpectrumPrototype::new("c2", SpectrumKind::Coincidence2D, "adc")
            .with_value("energy", 0);
        proto.coinc_window = 10.0;
        proto.channels = vec![
            ChannelConfig::default(),
            ChannelConfig {
                delay_ns: 0.0,
                cutoff_logic: 3,
            },
        ];
        proto.pattern_add = ChannelPattern::from_channels(&[0, 1]);
        let spectrum = Spectrum::new(proto);
        spectrum.push_spill(&spill(vec![
            ev(0, 0, 7),
            ev(1, 2, 4),
            ev(0, 100, 7),
            ev(1, 102, 2),
        ]));
        spectrum.flush();
        assert_eq!(spectrum.data_range(&[]), vec![Entry::new(vec![7, 4], 1.0)]);
    }

    #[test]
    fn test_reconfigure_and_clear() {
        let proto = SpectrumPrototype::new("e", SpectrumKind::Histogram1D, "adc").with_value("energy", 0);
        let spectrum = Spectrum::new(proto.clone());
        spectrum.push_spill(&spill(vec![ev(0, 0, 3)]));

        let mut calibrated = proto.clone();
        calibrated.values[0].calibration = crate::calibration::Calibration::affine(1.0, 2.0);
        spectrum.reconfigure(calibrated);
        assert_eq!(spectrum.data().get(&[3]), 1.0);
        assert_eq!(spectrum.axis_values(0), vec![1.0, 3.0, 5.0, 7.0]);
        assert_eq!(spectrum.status(), Status::Unconfigured);

        let mut reshaped = proto;
        reshaped.values[0].downsample = 1;
        spectrum.reconfigure(reshaped);
        assert!(spectrum.data().is_empty());

        spectrum.push_spill(&spill(vec![ev(0, 0, 3)]));
        spectrum.clear();
        assert!(spectrum.data().is_empty());
        assert_eq!(spectrum.status(), Status::Ready);
    }

    #[test]
    fn test_save_and_open() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = hdf5::File::create(tmp.path()).unwrap();
        let proto = SpectrumPrototype::new("e2", SpectrumKind::Histogram2D, "adc")
            .with_value("energy", 0)
            .with_value("psd", 0);
        let spectrum = Spectrum::new(proto.clone());
        spectrum.push_spill(&spill(vec![
            Event::new(0, 0, vec![3, 4]),
            Event::new(0, 0, vec![3, 4]),
            Event::new(0, 0, vec![1, 0]),
        ]));
        let group = file.create_group("e2").unwrap();
        spectrum.save(&group).unwrap();

        let opened = Spectrum::open(&group).unwrap();
        let mut expected = proto;
        expected.storage = Some(StorageKind::SparseMatrix);
        assert_eq!(opened.prototype(), expected);
        assert_eq!(opened.data_range(&[]), spectrum.data_range(&[]));
        assert_eq!(opened.stats().events_accepted, 3);
        assert_eq!(opened.status(), Status::Accumulating);
    }
}
