use std::collections::BTreeMap;

use super::{BinStore, Entry, Weight};

/// Compressed row storage for 2-D data.
///
/// Only occupied rows exist, keyed by coordinate 0; each row holds only its
/// occupied columns, sorted by coordinate 1. Good when most cells of a large
/// grid stay empty.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    rows: BTreeMap<u32, Vec<(u32, Weight)>>,
}

impl SparseMatrix {
    pub fn occupied(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    pub fn occupied_rows(&self) -> usize {
        self.rows.len()
    }
}

impl BinStore for SparseMatrix {
    fn get(&self, coords: &[u32]) -> Weight {
        let row = match self.rows.get(&coords[0]) {
            Some(r) => r,
            None => return 0.0,
        };
        match row.binary_search_by_key(&coords[1], |(col, _)| *col) {
            Ok(i) => row[i].1,
            Err(_) => 0.0,
        }
    }

    fn add(&mut self, coords: &[u32], weight: Weight) {
        let row = self.rows.entry(coords[0]).or_default();
        match row.binary_search_by_key(&coords[1], |(col, _)| *col) {
            Ok(i) => row[i].1 += weight,
            Err(i) => row.insert(i, (coords[1], weight)),
        }
    }

    fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        let mut entries = Vec::new();
        let (row_lo, row_hi) = bounds[0];
        let (col_lo, col_hi) = bounds[1];
        for (r, row) in self.rows.range(row_lo..=row_hi) {
            let start = row.partition_point(|(col, _)| *col < col_lo);
            for (col, weight) in row[start..].iter() {
                if *col > col_hi {
                    break;
                }
                if *weight != 0.0 {
                    entries.push(Entry::new(vec![*r, *col], *weight));
                }
            }
        }
        entries
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}
