use std::collections::VecDeque;

use super::prototype::{SpectrumKind, SpectrumPrototype};
use crate::calibration::Calibration;
use crate::coincidence::correlation::StreamCorrelator;
use crate::coincidence::{ChannelPattern, Coincidence, CoincidenceEngine, CoincidenceStats};
use crate::dataspace::{Dataspace, Weight};
use crate::event::Event;
use crate::filter::ValueLatch;
use crate::spill::Spill;

/// Floor a time difference into a bin. Negative or oversized results are rejected.
fn time_bin(delta_ns: f64, resolution: f64) -> Option<u32> {
    if delta_ns < 0.0 || !delta_ns.is_finite() {
        return None;
    }
    let bin = (delta_ns * resolution).floor();
    if bin > u32::MAX as f64 {
        return None;
    }
    Some(bin as u32)
}

/// Where time-of-flight spectra take their pulse times from
#[derive(Debug, Clone)]
pub enum PulseSource {
    /// The pulse_time key of every spill's state snapshot
    SpillState { pulse_ns: Option<f64> },
    /// The event times of a second stream, payload is the optional value bin
    Reference(StreamCorrelator<Option<u32>>),
}

/// Sliding window of counts over time since the earliest event.
///
/// Counts live in a deque of fixed width bins; the dataspace is only rewritten
/// from it on commit.
#[derive(Debug, Clone)]
pub struct RateWindow {
    resolution: f64,
    window_bins: Option<u64>,
    bin_width: f64,
    trim: bool,
    earliest_ns: Option<f64>,
    first_bin: u64,
    counts: VecDeque<Weight>,
    total: Weight,
}

impl RateWindow {
    pub fn new(prototype: &SpectrumPrototype) -> Self {
        let resolution = prototype.resolution_per_ns();
        let window_bins = if prototype.window > 0.0 && resolution > 0.0 {
            Some(((prototype.window * resolution).ceil() as u64).max(1))
        } else {
            None
        };
        let bin_width = if prototype.time_resolution > 0.0 {
            1.0 / prototype.time_resolution
        } else {
            0.0
        };
        Self {
            resolution,
            window_bins,
            bin_width,
            trim: prototype.trim,
            earliest_ns: None,
            first_bin: 0,
            counts: VecDeque::new(),
            total: 0.0,
        }
    }

    /// Counts currently inside the window
    pub fn total(&self) -> Weight {
        self.total
    }

    pub fn push(&mut self, time_ns: f64) -> bool {
        let earliest = *self.earliest_ns.get_or_insert(time_ns);
        let bin = match time_bin(time_ns - earliest, self.resolution) {
            Some(b) => b as u64,
            None => return false,
        };
        if bin < self.first_bin {
            return false;
        }
        if let Some(limit) = self.window_bins {
            // Slide the window so the new bin is its last one before growing
            if bin - self.first_bin >= limit {
                self.advance_to(bin + 1 - limit);
            }
        }
        let idx = (bin - self.first_bin) as usize;
        if idx >= self.counts.len() {
            self.counts.resize(idx + 1, 0.0);
        }
        self.counts[idx] += 1.0;
        self.total += 1.0;
        self.evict();
        true
    }

    fn advance_to(&mut self, first_bin: u64) {
        let drop = first_bin - self.first_bin;
        if drop >= self.counts.len() as u64 {
            self.counts.clear();
            self.total = 0.0;
        } else {
            for old in self.counts.drain(..drop as usize) {
                self.total -= old;
            }
        }
        self.first_bin = first_bin;
    }

    /// Bins currently held
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn evict(&mut self) {
        let limit = match self.window_bins {
            Some(l) => l,
            None => return,
        };
        while self.counts.len() as u64 > limit {
            if let Some(old) = self.counts.pop_front() {
                self.total -= old;
            }
            self.first_bin += 1;
        }
    }

    /// Rewrite the dataspace from the window. The last bin may still be filling.
    pub fn commit(&self, space: &mut Dataspace, include_last: bool) {
        space.clear();
        let n = if include_last {
            self.counts.len()
        } else {
            self.counts.len().saturating_sub(1)
        };
        for (idx, count) in self.counts.iter().take(n).enumerate() {
            space.add_weight(&[idx as u32], *count);
        }
        if let Some(axis) = space.axis_mut(0) {
            axis.recalibrate(Calibration::affine(
                self.first_bin as f64 * self.bin_width,
                self.bin_width,
            ));
        }
    }

    pub fn reset(&mut self) {
        self.earliest_ns = None;
        self.first_bin = 0;
        self.counts.clear();
        self.total = 0.0;
    }
}

/// Coincidence grouping in front of the dataspace
#[derive(Debug, Clone)]
pub struct CoincidenceBinner {
    engine: CoincidenceEngine,
    pattern_add: ChannelPattern,
    two_d: bool,
    cutoffs: Vec<u32>,
    emitted: Vec<Coincidence>,
}

impl CoincidenceBinner {
    pub fn new(prototype: &SpectrumPrototype) -> Self {
        Self {
            engine: CoincidenceEngine::new(
                prototype.coinc_window,
                &prototype.channels,
                prototype.pattern_coinc.clone(),
                prototype.pattern_anti.clone(),
            ),
            pattern_add: prototype.pattern_add.clone(),
            two_d: prototype.kind == SpectrumKind::Coincidence2D,
            cutoffs: prototype.channels.iter().map(|c| c.cutoff_logic).collect(),
            emitted: Vec::new(),
        }
    }

    fn cutoff(&self, channel: i16) -> u32 {
        if channel < 0 {
            return 0;
        }
        self.cutoffs.get(channel as usize).copied().unwrap_or(0)
    }

    fn push(&mut self, event: &Event, time_ns: f64, latch: &ValueLatch, space: &mut Dataspace) -> bool {
        match latch.raw(event) {
            Some(v) if v >= self.cutoff(event.channel) => (),
            _ => return false,
        }
        self.engine.push_event(event, time_ns, &mut self.emitted);
        self.bin_emitted(latch, space);
        true
    }

    fn flush(&mut self, latch: &ValueLatch, space: &mut Dataspace) {
        self.engine.flush(&mut self.emitted);
        self.bin_emitted(latch, space);
    }

    fn bin_emitted(&mut self, latch: &ValueLatch, space: &mut Dataspace) {
        for coincidence in self.emitted.drain(..) {
            if self.two_d {
                let mut channels = self.pattern_add.channels();
                let (a, b) = match (channels.next(), channels.next()) {
                    (Some(a), Some(b)) => (a as i16, b as i16),
                    _ => continue,
                };
                let va = coincidence.hit(a).and_then(|h| latch.extract(&h.event));
                let vb = coincidence.hit(b).and_then(|h| latch.extract(&h.event));
                if let (Some(va), Some(vb)) = (va, vb) {
                    space.add_one(&[va, vb]);
                }
            } else {
                for hit in coincidence.hits() {
                    if !self.pattern_add.is_empty() && !self.pattern_add.contains(hit.channel) {
                        continue;
                    }
                    if let Some(v) = latch.extract(&hit.event) {
                        space.add_one(&[v]);
                    }
                }
            }
        }
    }
}

/// The rule turning accepted events into dataspace coordinates
#[derive(Debug, Clone)]
pub enum Binner {
    Counter,
    Direct,
    Image,
    TimeOfFlight {
        pulses: PulseSource,
        with_value: bool,
    },
    TimeDelta {
        previous_ns: Option<f64>,
    },
    RateWindow(RateWindow),
    Coincidence(CoincidenceBinner),
}

impl Binner {
    pub fn new(prototype: &SpectrumPrototype) -> Self {
        match prototype.kind {
            SpectrumKind::Counter => Self::Counter,
            SpectrumKind::Histogram1D | SpectrumKind::Histogram2D | SpectrumKind::Histogram3D => {
                Self::Direct
            }
            SpectrumKind::Image => Self::Image,
            SpectrumKind::TimeOfFlight | SpectrumKind::TimeOfFlightValue => {
                let pulses = match prototype.reference_stream_id {
                    Some(_) => PulseSource::Reference(StreamCorrelator::new(prototype.max_lookback)),
                    None => PulseSource::SpillState { pulse_ns: None },
                };
                Self::TimeOfFlight {
                    pulses,
                    with_value: prototype.kind == SpectrumKind::TimeOfFlightValue,
                }
            }
            SpectrumKind::TimeDelta => Self::TimeDelta { previous_ns: None },
            SpectrumKind::RateWindow => Self::RateWindow(RateWindow::new(prototype)),
            SpectrumKind::Coincidence1D | SpectrumKind::Coincidence2D => {
                Self::Coincidence(CoincidenceBinner::new(prototype))
            }
        }
    }

    /// Does this binner consume a reference stream?
    pub fn uses_reference(&self) -> bool {
        matches!(
            self,
            Self::TimeOfFlight {
                pulses: PulseSource::Reference(_),
                ..
            }
        )
    }

    /// Configuration the binner needs beyond valid latches
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Coincidence(c) => !c.two_d || c.pattern_add.len() >= 2,
            _ => true,
        }
    }

    pub fn coincidence_stats(&self) -> Option<CoincidenceStats> {
        match self {
            Self::Coincidence(c) => Some(c.engine.stats()),
            _ => None,
        }
    }

    /// Primary events that were dropped for lack of a reference
    pub fn uncorrelated(&self) -> u64 {
        match self {
            Self::TimeOfFlight {
                pulses: PulseSource::Reference(corr),
                ..
            } => corr.dropped(),
            _ => 0,
        }
    }

    /// Per-spill bookkeeping before its events are binned
    pub fn on_spill(&mut self, spill: &Spill) {
        match self {
            Self::TimeOfFlight {
                pulses: PulseSource::SpillState { pulse_ns },
                ..
            } => {
                if let Some(pulse) = spill.pulse_time() {
                    *pulse_ns = Some(pulse);
                }
            }
            Self::TimeDelta { previous_ns } if spill.is_boundary() => *previous_ns = None,
            _ => (),
        }
    }

    /// Bin one filtered event. Returns false when the event produced nothing
    /// and never will.
    pub fn bin_event(
        &mut self,
        event: &Event,
        time_ns: f64,
        latches: &[ValueLatch],
        resolution: f64,
        space: &mut Dataspace,
    ) -> bool {
        match self {
            Self::Counter => {
                space.add_one(&[]);
                true
            }
            Self::Direct => {
                let coords: Option<Vec<u32>> = latches.iter().map(|l| l.extract(event)).collect();
                match coords {
                    Some(c) => {
                        space.add_one(&c);
                        true
                    }
                    None => false,
                }
            }
            Self::Image => {
                let x = latches.first().and_then(|l| l.extract(event));
                let y = latches.get(1).and_then(|l| l.extract(event));
                let w = latches.get(2).and_then(|l| l.extract(event));
                match (x, y, w) {
                    (Some(x), Some(y), Some(w)) => {
                        space.add_weight(&[x, y], w as Weight);
                        true
                    }
                    _ => false,
                }
            }
            Self::TimeOfFlight { pulses, with_value } => {
                let value = if *with_value {
                    match latches.first().and_then(|l| l.extract(event)) {
                        Some(v) => Some(v),
                        None => return false,
                    }
                } else {
                    None
                };
                match pulses {
                    PulseSource::SpillState { pulse_ns } => match pulse_ns {
                        Some(pulse) => add_time_of_flight(time_ns - *pulse, value, resolution, space),
                        None => false,
                    },
                    PulseSource::Reference(corr) => {
                        corr.push_primary(time_ns, value);
                        true
                    }
                }
            }
            Self::TimeDelta { previous_ns } => {
                let binned = match previous_ns {
                    Some(prev) => match time_bin(time_ns - *prev, resolution) {
                        Some(bin) => {
                            space.add_one(&[bin]);
                            true
                        }
                        None => false,
                    },
                    // The first event only seeds the reference time
                    None => false,
                };
                *previous_ns = Some(time_ns);
                binned
            }
            Self::RateWindow(window) => window.push(time_ns),
            Self::Coincidence(coinc) => match latches.first() {
                Some(latch) => coinc.push(event, time_ns, latch, space),
                None => false,
            },
        }
    }

    /// Feed the events of a reference stream spill
    pub fn push_reference(&mut self, spill: &Spill, resolution: f64, space: &mut Dataspace) {
        if let Self::TimeOfFlight {
            pulses: PulseSource::Reference(corr),
            ..
        } = self
        {
            for event in spill.events.iter() {
                corr.push_reference(event.time_ns(&spill.event_model.timebase));
            }
        }
        self.after_spill(resolution, space);
    }

    /// Work that becomes possible once a whole spill has been seen
    pub fn after_spill(&mut self, resolution: f64, space: &mut Dataspace) {
        match self {
            Self::TimeOfFlight {
                pulses: PulseSource::Reference(corr),
                ..
            } => {
                let mut resolved = Vec::new();
                corr.resolve(&mut resolved);
                for (delta, value) in resolved {
                    add_time_of_flight(delta, value, resolution, space);
                }
            }
            Self::RateWindow(window) => window.commit(space, false),
            _ => (),
        }
    }

    /// Drain everything held back. Safe to call repeatedly.
    pub fn flush(&mut self, latches: &[ValueLatch], resolution: f64, space: &mut Dataspace) {
        match self {
            Self::TimeOfFlight {
                pulses: PulseSource::Reference(corr),
                ..
            } => {
                let mut resolved = Vec::new();
                corr.flush(&mut resolved);
                for (delta, value) in resolved {
                    add_time_of_flight(delta, value, resolution, space);
                }
            }
            Self::RateWindow(window) => window.commit(space, !window.trim),
            Self::Coincidence(coinc) => {
                if let Some(latch) = latches.first() {
                    coinc.flush(latch, space);
                }
            }
            _ => (),
        }
    }

    /// Forget held back events and running state
    pub fn reset(&mut self) {
        match self {
            Self::TimeOfFlight { pulses, .. } => match pulses {
                PulseSource::SpillState { pulse_ns } => *pulse_ns = None,
                PulseSource::Reference(corr) => corr.reset(),
            },
            Self::TimeDelta { previous_ns } => *previous_ns = None,
            Self::RateWindow(window) => window.reset(),
            Self::Coincidence(coinc) => {
                coinc.engine.reset();
                coinc.emitted.clear();
            }
            _ => (),
        }
    }
}

fn add_time_of_flight(
    delta_ns: f64,
    value: Option<u32>,
    resolution: f64,
    space: &mut Dataspace,
) -> bool {
    let bin = match time_bin(delta_ns, resolution) {
        Some(b) => b,
        None => return false,
    };
    match value {
        Some(v) => space.add_one(&[bin, v]),
        None => space.add_one(&[bin]),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataspace::StorageKind;
    use crate::spectrum::prototype::TimeUnits;

    fn rate_prototype(window: f64, trim: bool) -> SpectrumPrototype {
        let mut proto = SpectrumPrototype::new("rate", SpectrumKind::RateWindow, "adc");
        proto.time_resolution = 1.0;
        proto.time_units = TimeUnits::Us;
        proto.window = window;
        proto.trim = trim;
        proto
    }

    fn space(proto: &SpectrumPrototype) -> Dataspace {
        Dataspace::new(StorageKind::SparseMap, proto.axes())
    }

    #[test]
    fn test_time_bin() {
        assert_eq!(time_bin(25.0, 0.1), Some(2));
        assert_eq!(time_bin(-1.0, 0.1), None);
        assert_eq!(time_bin(0.0, 1.0), Some(0));
    }

    #[test]
    fn test_rate_window_commit_excludes_partial_bin() {
        let proto = rate_prototype(0.0, false);
        let mut window = RateWindow::new(&proto);
        let mut ds = space(&proto);
        for t in [0.0, 10.0, 1500.0, 2100.0, 2200.0] {
            assert!(window.push(t));
        }
        window.commit(&mut ds, false);
        assert_eq!(ds.get(&[0]), 2.0);
        assert_eq!(ds.get(&[1]), 1.0);
        assert_eq!(ds.get(&[2]), 0.0);
        window.commit(&mut ds, true);
        window.commit(&mut ds, true);
        assert_eq!(ds.get(&[2]), 2.0);
        assert_eq!(ds.total_count(), 5.0);
    }

    #[test]
    fn test_rate_window_eviction() {
        let proto = rate_prototype(2000.0, true);
        let mut window = RateWindow::new(&proto);
        let mut ds = space(&proto);
        for t in [0.0, 1000.0, 2000.0, 3000.0, 3500.0] {
            window.push(t);
        }
        assert_eq!(window.total(), 3.0);
        window.commit(&mut ds, !proto.trim);
        ds.recalc_axes();
        assert_eq!(ds.get(&[0]), 1.0);
        assert_eq!(ds.get(&[1]), 0.0);
        assert_eq!(ds.axis_values(0), vec![2.0]);
        assert!(!window.push(500.0));
    }

    #[test]
    fn test_time_delta_resets_on_boundary() {
        let proto = SpectrumPrototype::new("dt", SpectrumKind::TimeDelta, "adc");
        let mut binner = Binner::new(&proto);
        let mut ds = space(&proto);
        let event = Event::new(0, 0, vec![]);
        assert!(!binner.bin_event(&event, 100.0, &[], 1.0, &mut ds));
        assert!(binner.bin_event(&event, 130.0, &[], 1.0, &mut ds));
        binner.on_spill(&Spill::stop("adc", Default::default(), Default::default()));
        assert!(!binner.bin_event(&event, 500.0, &[], 1.0, &mut ds));
        assert_eq!(ds.total_count(), 1.0);
        assert_eq!(ds.get(&[30]), 1.0);
    }

    #[test]
    fn test_rate_window_gap_stays_bounded() {
        let mut proto = SpectrumPrototype::new("rate", SpectrumKind::RateWindow, "adc");
        proto.window = 10.0;
        let mut window = RateWindow::new(&proto);
        assert!(window.push(0.0));
        assert!(window.push(2.0e8));
        assert!(window.len() <= 10);
        assert_eq!(window.total(), 1.0);
        assert!(window.push(2.0e8 + 3.0));
        assert_eq!(window.len(), 10);
        assert_eq!(window.total(), 2.0);

        let mut ds = space(&proto);
        window.commit(&mut ds, true);
        assert_eq!(ds.total_count(), 2.0);
        assert_eq!(ds.get(&[6]), 1.0);
        assert_eq!(ds.get(&[9]), 1.0);
        assert_eq!(ds.axis(0).map(|a| a.bin_to_value(6)), Some(2.0e8));
    }
}
