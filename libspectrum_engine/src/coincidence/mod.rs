//! Time window grouping of events across channels.
//!
//! The [`CoincidenceEngine`] keeps a backlog of open [`Coincidence`]s ordered by
//! their start time. Each incoming hit either joins the open coincidence whose
//! window contains it, is rejected as a pile-up, or seeds a new coincidence.
//! Coincidences are emitted once no further hit can reach them, i.e. once a
//! hit arrives past `start + coinc_window + max_delay`, where
//! `max_delay = max(delay_ns) + coinc_window`.
pub mod correlation;

use bit_set::BitSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::str::FromStr;

use super::error::PrototypeError;
use super::event::Event;

/// A set of channels, written as a string of `0`/`1` where character `i` is channel `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelPattern {
    channels: BitSet,
}

impl ChannelPattern {
    pub fn from_channels(channels: &[usize]) -> Self {
        Self {
            channels: channels.iter().copied().collect(),
        }
    }

    pub fn contains(&self, channel: i16) -> bool {
        channel >= 0 && self.channels.contains(channel as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Member channels in ascending order
    pub fn channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels.iter()
    }

    /// Every channel of the pattern is present
    pub fn satisfied_by(&self, present: &BitSet) -> bool {
        self.channels.is_subset(present)
    }

    /// At least one channel of the pattern is present
    pub fn intersects(&self, present: &BitSet) -> bool {
        !self.channels.is_disjoint(present)
    }
}

impl Display for ChannelPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.channels.iter().last().map(|c| c + 1).unwrap_or(0);
        let text: String = (0..width)
            .map(|c| if self.channels.contains(c) { '1' } else { '0' })
            .collect();
        write!(f, "{text}")
    }
}

impl FromStr for ChannelPattern {
    type Err = PrototypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut channels = BitSet::new();
        for (idx, bit) in s.trim().chars().enumerate() {
            match bit {
                '1' => {
                    channels.insert(idx);
                }
                '0' => (),
                _ => return Err(PrototypeError::BadPattern(s.to_string())),
            }
        }
        Ok(Self { channels })
    }
}

impl TryFrom<String> for ChannelPattern {
    type Error = PrototypeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChannelPattern> for String {
    fn from(value: ChannelPattern) -> Self {
        value.to_string()
    }
}

/// Per-channel coincidence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Digital delay added to the event time before windowing
    #[serde(default)]
    pub delay_ns: f64,
    /// Minimum value (full resolution) for a hit of this channel to take part
    #[serde(default)]
    pub cutoff_logic: u32,
}

/// One event taking part in a coincidence, with its delay adjusted time
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub channel: i16,
    pub time_ns: f64,
    pub event: Event,
}

/// A group of hits, at most one per channel, inside one time window.
#[derive(Debug, Clone, PartialEq)]
pub struct Coincidence {
    hits: Vec<Hit>,
    start: f64,
    end: f64,
}

impl Coincidence {
    fn seed(hit: Hit, window: f64) -> Self {
        let start = hit.time_ns;
        Self {
            hits: vec![hit],
            start,
            end: start + window,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn hit(&self, channel: i16) -> Option<&Hit> {
        self.hits.iter().find(|h| h.channel == channel)
    }

    pub fn channels(&self) -> BitSet {
        self.hits
            .iter()
            .filter(|h| h.channel >= 0)
            .map(|h| h.channel as usize)
            .collect()
    }

    pub fn contains(&self, time_ns: f64) -> bool {
        time_ns >= self.start && time_ns <= self.end
    }

    /// Nothing arriving at or after time_ns can still belong here
    pub fn past_due(&self, time_ns: f64, max_delay: f64) -> bool {
        time_ns > self.end + max_delay
    }

    /// time_ns precedes this coincidence by more than any delay can explain
    pub fn antecedent(&self, time_ns: f64, max_delay: f64) -> bool {
        time_ns + max_delay < self.start
    }

    /// Refuses a second hit on a channel that is already filled
    fn add_hit(&mut self, hit: &Hit) -> bool {
        if self.hits.iter().any(|h| h.channel == hit.channel) {
            return false;
        }
        self.hits.push(hit.clone());
        true
    }
}

/// Anomaly and outcome counters of a CoincidenceEngine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoincidenceStats {
    pub emitted: u64,
    pub rejected: u64,
    pub pileups: u64,
    pub double_matches: u64,
    pub antecedents: u64,
}

#[derive(Debug, Clone)]
pub struct CoincidenceEngine {
    window: f64,
    max_delay: f64,
    delays: Vec<f64>,
    pattern_coinc: ChannelPattern,
    pattern_anti: ChannelPattern,
    backlog: VecDeque<Coincidence>,
    stats: CoincidenceStats,
}

impl CoincidenceEngine {
    pub fn new(
        window: f64,
        channels: &[ChannelConfig],
        pattern_coinc: ChannelPattern,
        pattern_anti: ChannelPattern,
    ) -> Self {
        let delays: Vec<f64> = channels.iter().map(|c| c.delay_ns).collect();
        let max_delay = delays.iter().copied().fold(0.0, f64::max) + window;
        Self {
            window,
            max_delay,
            delays,
            pattern_coinc,
            pattern_anti,
            backlog: VecDeque::new(),
            stats: CoincidenceStats::default(),
        }
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn stats(&self) -> CoincidenceStats {
        self.stats
    }

    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    fn delay(&self, channel: i16) -> f64 {
        if channel < 0 {
            return 0.0;
        }
        self.delays.get(channel as usize).copied().unwrap_or(0.0)
    }

    /// Feed one event (time in ns, before delay) and collect every coincidence
    /// that became due into `emitted`.
    pub fn push_event(&mut self, event: &Event, time_ns: f64, emitted: &mut Vec<Coincidence>) {
        let hit = Hit {
            channel: event.channel,
            time_ns: time_ns + self.delay(event.channel),
            event: event.clone(),
        };
        let t = hit.time_ns;

        let seed_new = match self.backlog.back() {
            Some(last) => last.past_due(t, self.max_delay),
            None => true,
        };

        if seed_new {
            self.backlog.push_back(Coincidence::seed(hit, self.window));
        } else {
            let mut matched = 0;
            let mut piled_up = false;
            // Newest first: once an entry is past due every older one is as well
            for idx in (0..self.backlog.len()).rev() {
                let entry = &mut self.backlog[idx];
                if entry.contains(t) {
                    if entry.add_hit(&hit) {
                        matched += 1;
                        if matched > 1 {
                            self.stats.double_matches += 1;
                            spdlog::warn!(
                                "Hit on channel {} at {} ns counted twice in overlapping coincidences",
                                hit.channel,
                                t
                            );
                        }
                    } else {
                        piled_up = true;
                        self.stats.pileups += 1;
                        spdlog::warn!(
                            "Pile-up on channel {} at {} ns in coincidence starting at {} ns",
                            hit.channel,
                            t,
                            entry.start()
                        );
                    }
                } else if entry.past_due(t, self.max_delay) {
                    break;
                } else if entry.antecedent(t, self.max_delay) {
                    self.stats.antecedents += 1;
                    spdlog::warn!(
                        "Hit on channel {} at {} ns precedes coincidence starting at {} ns; upstream events are out of order",
                        hit.channel,
                        t,
                        entry.start()
                    );
                }
            }
            if matched == 0 && !piled_up {
                self.backlog.push_back(Coincidence::seed(hit, self.window));
            }
        }

        while let Some(front) = self.backlog.front() {
            if !front.past_due(t, self.max_delay) {
                break;
            }
            if let Some(done) = self.backlog.pop_front() {
                self.emit(done, emitted);
            }
        }
    }

    /// Emit the whole backlog; no more events will make it due
    pub fn flush(&mut self, emitted: &mut Vec<Coincidence>) {
        while let Some(done) = self.backlog.pop_front() {
            self.emit(done, emitted);
        }
    }

    /// Drop the backlog and counters
    pub fn reset(&mut self) {
        self.backlog.clear();
        self.stats = CoincidenceStats::default();
    }

    fn validate(&self, coincidence: &Coincidence) -> bool {
        let present = coincidence.channels();
        self.pattern_coinc.satisfied_by(&present) && !self.pattern_anti.intersects(&present)
    }

    fn emit(&mut self, coincidence: Coincidence, emitted: &mut Vec<Coincidence>) {
        if self.validate(&coincidence) {
            self.stats.emitted += 1;
            emitted.push(coincidence);
        } else {
            self.stats.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(window: f64, coinc: &str, anti: &str) -> CoincidenceEngine {
        CoincidenceEngine::new(
            window,
            &[],
            coinc.parse().unwrap(),
            anti.parse().unwrap(),
        )
    }

    fn hit(channel: i16) -> Event {
        Event::new(channel, 0, vec![100 + channel as u32])
    }

    #[test]
    fn test_pattern_text() {
        let pattern: ChannelPattern = "0110".parse().unwrap();
        assert!(pattern.contains(1));
        assert!(pattern.contains(2));
        assert!(!pattern.contains(0));
        assert!(!pattern.contains(-1));
        assert_eq!(pattern.to_string(), "011");
        assert_eq!(pattern.channels().collect::<Vec<_>>(), vec![1, 2]);
        assert!("01x".parse::<ChannelPattern>().is_err());
    }

    #[test]
    fn test_three_channel_grouping() {
        let mut engine = engine(100.0, "111", "");
        let mut out = Vec::new();
        engine.push_event(&hit(0), 0.0, &mut out);
        engine.push_event(&hit(1), 10.0, &mut out);
        engine.push_event(&hit(2), 20.0, &mut out);
        assert!(out.is_empty());
        engine.push_event(&hit(0), 500.0, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hits().len(), 3);
        assert_eq!(engine.pending(), 1);

        engine.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(engine.stats().rejected, 1);
        assert_eq!(engine.pending(), 0);
        engine.flush(&mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_pileup() {
        let mut engine = engine(100.0, "", "");
        let mut out = Vec::new();
        engine.push_event(&hit(0), 0.0, &mut out);
        engine.push_event(&hit(0), 10.0, &mut out);
        engine.flush(&mut out);
        assert_eq!(engine.stats().pileups, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hits().len(), 1);
    }

    #[test]
    fn test_anti_pattern() {
        let mut engine = engine(100.0, "1", "0001");
        let mut out = Vec::new();
        engine.push_event(&hit(0), 0.0, &mut out);
        engine.push_event(&hit(3), 5.0, &mut out);
        engine.push_event(&hit(0), 1000.0, &mut out);
        engine.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start(), 1000.0);
        assert_eq!(engine.stats().rejected, 1);
    }

    #[test]
    fn test_delay_joins_window() {
        let channels = vec![
            ChannelConfig::default(),
            ChannelConfig {
                delay_ns: 300.0,
                cutoff_logic: 0,
            },
        ];
        let mut engine =
            CoincidenceEngine::new(50.0, &channels, "11".parse().unwrap(), ChannelPattern::default());
        assert_eq!(engine.max_delay(), 350.0);
        let mut out = Vec::new();
        engine.push_event(&hit(1), 0.0, &mut out);
        engine.push_event(&hit(0), 310.0, &mut out);
        engine.flush(&mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hits().len(), 2);
    }

    #[test]
    fn test_double_match_is_counted_once_per_coincidence() {
        let mut engine = engine(100.0, "", "");
        let mut out = Vec::new();
        engine.push_event(&hit(0), 100.0, &mut out);
        engine.push_event(&hit(1), 60.0, &mut out);
        engine.push_event(&hit(2), 120.0, &mut out);
        assert_eq!(engine.stats().double_matches, 1);
        engine.flush(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.hit(2).is_some()));
    }

    #[test]
    fn test_antecedent_is_logged_and_seeded() {
        let mut engine = engine(100.0, "", "");
        let mut out = Vec::new();
        engine.push_event(&hit(0), 1000.0, &mut out);
        engine.push_event(&hit(1), 500.0, &mut out);
        assert_eq!(engine.stats().antecedents, 1);
        assert_eq!(engine.pending(), 2);
    }
}
