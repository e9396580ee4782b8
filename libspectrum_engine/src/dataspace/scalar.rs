use super::{BinStore, Entry, Weight};

/// Zero dimensional storage: a single accumulated weight
#[derive(Debug, Clone, Default)]
pub struct Scalar {
    weight: Weight,
}

impl BinStore for Scalar {
    fn get(&self, _coords: &[u32]) -> Weight {
        self.weight
    }

    fn add(&mut self, _coords: &[u32], weight: Weight) {
        self.weight += weight;
    }

    fn range(&self, _bounds: &[(u32, u32)]) -> Vec<Entry> {
        if self.weight == 0.0 {
            Vec::new()
        } else {
            vec![Entry::new(Vec::new(), self.weight)]
        }
    }

    fn clear(&mut self) {
        self.weight = 0.0;
    }
}
