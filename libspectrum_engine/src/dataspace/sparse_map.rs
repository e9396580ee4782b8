use fxhash::FxHashMap;

use super::{BinStore, Entry, Weight};

/// Association storage keyed by the full coordinate tuple.
///
/// Works for any dimensionality and only pays for occupied bins, which suits
/// diffuse or high dimensional data. Ordering is recovered at export time.
#[derive(Debug, Clone, Default)]
pub struct SparseMap {
    dimensions: usize,
    bins: FxHashMap<Vec<u32>, Weight>,
}

impl SparseMap {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            bins: FxHashMap::default(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn occupied(&self) -> usize {
        self.bins.len()
    }
}

impl BinStore for SparseMap {
    fn get(&self, coords: &[u32]) -> Weight {
        self.bins.get(coords).copied().unwrap_or(0.0)
    }

    fn add(&mut self, coords: &[u32], weight: Weight) {
        if let Some(w) = self.bins.get_mut(coords) {
            *w += weight;
        } else {
            self.bins.insert(coords.to_vec(), weight);
        }
    }

    fn add_one(&mut self, coords: &[u32]) {
        // Only allocate a key the first time a bin is hit
        if let Some(w) = self.bins.get_mut(coords) {
            *w += 1.0;
        } else {
            self.bins.insert(coords.to_vec(), 1.0);
        }
    }

    fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .bins
            .iter()
            .filter(|(coords, weight)| {
                **weight != 0.0
                    && coords
                        .iter()
                        .zip(bounds.iter())
                        .all(|(c, (lo, hi))| c >= lo && c <= hi)
            })
            .map(|(coords, weight)| Entry::new(coords.clone(), *weight))
            .collect();
        entries.sort_by(|a, b| a.coords.cmp(&b.coords));
        entries
    }

    fn clear(&mut self) {
        self.bins.clear();
    }
}
