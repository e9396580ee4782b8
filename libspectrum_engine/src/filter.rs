use serde::{Deserialize, Serialize};

use super::event::{Event, EventModel};

/// Largest downsample a latch accepts; beyond it every u32 value lands in bin 0.
pub const MAX_DOWNSAMPLE: u8 = 31;

/// Resolution of a configured value name to an index of the current EventModel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueLatch {
    pub value_id: String,
    pub downsample: u8,
    idx: Option<usize>,
}

impl ValueLatch {
    pub fn new(value_id: &str, downsample: u8) -> Self {
        Self {
            value_id: value_id.to_string(),
            downsample,
            idx: None,
        }
    }

    /// Resolve the value name; an absent name invalidates the latch
    pub fn configure(&mut self, model: &EventModel) {
        self.idx = model.value_index(&self.value_id);
    }

    /// Resolved and with a usable downsample
    pub fn valid(&self) -> bool {
        self.idx.is_some() && self.downsample <= MAX_DOWNSAMPLE
    }

    pub fn index(&self) -> Option<usize> {
        self.idx
    }

    /// The full resolution value
    pub fn raw(&self, event: &Event) -> Option<u32> {
        self.idx.and_then(|i| event.value(i))
    }

    /// The downsampled bin of the value
    pub fn extract(&self, event: &Event) -> Option<u32> {
        self.raw(event).map(|v| v.checked_shr(self.downsample as u32).unwrap_or(0))
    }
}

/// Configuration of one filter, as written in the prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub value_id: String,
    #[serde(default)]
    pub min: u32,
    #[serde(default = "default_max")]
    pub max: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_max() -> u32 {
    u32::MAX
}

/// Admits events whose named value lies in `[min, max]`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueFilter {
    pub enabled: bool,
    pub min: u32,
    pub max: u32,
    latch: ValueLatch,
}

impl ValueFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            enabled: config.enabled,
            min: config.min,
            max: config.max,
            latch: ValueLatch::new(&config.value_id, 0),
        }
    }

    pub fn configure(&mut self, model: &EventModel) {
        self.latch.configure(model);
    }

    pub fn valid(&self) -> bool {
        self.latch.valid()
    }

    /// False whenever the value name is unresolved
    pub fn accept(&self, event: &Event) -> bool {
        match self.latch.raw(event) {
            Some(v) => self.min <= v && v <= self.max,
            None => false,
        }
    }
}

/// An ordered set of filters combined with a logical AND.
///
/// Only enabled filters take part, so an empty or fully disabled block accepts
/// everything. Configure once per spill, never per event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterBlock {
    filters: Vec<ValueFilter>,
}

impl FilterBlock {
    pub fn new(configs: &[FilterConfig]) -> Self {
        Self {
            filters: configs.iter().map(ValueFilter::new).collect(),
        }
    }

    pub fn configure(&mut self, model: &EventModel) {
        for filter in self.filters.iter_mut() {
            filter.configure(model);
        }
    }

    pub fn accept(&self, event: &Event) -> bool {
        self.filters
            .iter()
            .filter(|f| f.enabled)
            .all(|f| f.accept(event))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimeBase;

    fn model() -> EventModel {
        EventModel::new(TimeBase::default())
            .with_value("val")
            .with_value("val2")
    }

    fn filter(enabled: bool, min: u32, max: u32) -> FilterConfig {
        FilterConfig {
            enabled,
            value_id: String::from("val2"),
            min,
            max,
        }
    }

    #[test]
    fn test_latch() {
        let mut latch = ValueLatch::new("val2", 2);
        assert!(!latch.valid());
        latch.configure(&model());
        assert!(latch.valid());
        assert_eq!(latch.index(), Some(1));
        let event = Event::new(0, 0, vec![1, 13]);
        assert_eq!(latch.extract(&event), Some(3));
        assert_eq!(latch.raw(&event), Some(13));
        latch.configure(&EventModel::default());
        assert!(!latch.valid());
        assert_eq!(latch.extract(&event), None);
    }

    #[test]
    fn test_latch_rejects_wide_downsample() {
        let mut latch = ValueLatch::new("val", MAX_DOWNSAMPLE);
        latch.configure(&model());
        assert!(latch.valid());
        let mut latch = ValueLatch::new("val", 64);
        latch.configure(&model());
        assert!(!latch.valid());
        assert_eq!(latch.extract(&Event::new(0, 0, vec![u32::MAX])), Some(0));
    }

    #[test]
    fn test_filter_block() {
        let mut block = FilterBlock::new(&[filter(true, 10, 20)]);
        block.configure(&model());
        let accepted = [0, 15, 30]
            .iter()
            .filter(|v| block.accept(&Event::new(0, 0, vec![0, **v])))
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_disabled_and_empty_blocks() {
        let event = Event::new(0, 0, vec![0, 50]);
        let empty = FilterBlock::default();
        assert!(empty.accept(&event));
        let mut disabled = FilterBlock::new(&[filter(false, 10, 20)]);
        disabled.configure(&model());
        assert!(disabled.accept(&event));
    }

    #[test]
    fn test_unresolved_filter_rejects() {
        let mut block = FilterBlock::new(&[filter(true, 0, 100)]);
        block.configure(&EventModel::default().with_value("val"));
        assert!(!block.accept(&Event::new(0, 0, vec![5, 5])));
    }
}
