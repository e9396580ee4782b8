use ndarray::{s, Array2};

use super::{BinStore, Entry, Weight};

/// Flat 2-D storage.
///
/// Grows in powers of two as coordinates beyond the current shape arrive. Best
/// when data is expected to fill most of a bounded grid (images).
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    data: Array2<Weight>,
}

impl Default for DenseMatrix {
    fn default() -> Self {
        Self {
            data: Array2::zeros((0, 0)),
        }
    }
}

impl DenseMatrix {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    fn ensure_size(&mut self, rows: usize, cols: usize) {
        let (n_rows, n_cols) = self.data.dim();
        if rows <= n_rows && cols <= n_cols {
            return;
        }
        let new_rows = n_rows.max(rows.next_power_of_two());
        let new_cols = n_cols.max(cols.next_power_of_two());
        let mut grown = Array2::<Weight>::zeros((new_rows, new_cols));
        grown.slice_mut(s![..n_rows, ..n_cols]).assign(&self.data);
        self.data = grown;
    }
}

impl BinStore for DenseMatrix {
    fn get(&self, coords: &[u32]) -> Weight {
        self.data
            .get((coords[0] as usize, coords[1] as usize))
            .copied()
            .unwrap_or(0.0)
    }

    fn add(&mut self, coords: &[u32], weight: Weight) {
        let (r, c) = (coords[0] as usize, coords[1] as usize);
        self.ensure_size(r + 1, c + 1);
        self.data[[r, c]] += weight;
    }

    fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        let mut entries = Vec::new();
        let (n_rows, n_cols) = self.data.dim();
        if n_rows == 0 || n_cols == 0 {
            return entries;
        }
        let (row_lo, row_hi) = bounds[0];
        let (col_lo, col_hi) = bounds[1];
        let row_hi = (row_hi as usize).min(n_rows - 1);
        let col_hi = (col_hi as usize).min(n_cols - 1);
        for r in (row_lo as usize)..=row_hi {
            for c in (col_lo as usize)..=col_hi {
                let weight = self.data[[r, c]];
                if weight != 0.0 {
                    entries.push(Entry::new(vec![r as u32, c as u32], weight));
                }
            }
        }
        entries
    }

    fn clear(&mut self) {
        self.data = Array2::zeros((0, 0));
    }
}
