use ndarray::{Array1, Array2};

use super::{Dataspace, Weight};
use crate::error::DataspaceError;

pub const COORDS_NAME: &str = "coords";
pub const WEIGHTS_NAME: &str = "weights";
pub const DIMENSIONS_ATTR: &str = "dimensions";
pub const TOTAL_COUNT_ATTR: &str = "total_count";

// Structure
// data - dimensions, total_count
// |---- coords(dset)  u32 [n_entries, max(dimensions, 1)]
// |---- weights(dset) f64 [n_entries]
//
// Only non-zero entries are written, whatever the storage variant. An empty
// dataspace writes the attributes and no datasets.

impl Dataspace {
    /// Width of the coordinate column. Scalars keep a single zero column.
    fn coordinate_width(&self) -> usize {
        self.dimensions().max(1)
    }

    /// Write the non-zero entries into the group
    pub fn save(&self, group: &hdf5::Group) -> Result<(), DataspaceError> {
        if !group.is_valid() {
            return Err(DataspaceError::InvalidGroup);
        }
        group
            .new_attr::<u32>()
            .create(DIMENSIONS_ATTR)?
            .write_scalar(&(self.dimensions() as u32))?;
        group
            .new_attr::<f64>()
            .create(TOTAL_COUNT_ATTR)?
            .write_scalar(&self.total_count())?;

        let entries = self.range(&[]);
        if entries.is_empty() {
            return Ok(());
        }

        let width = self.coordinate_width();
        let mut coords = Array2::<u32>::zeros((entries.len(), width));
        let mut weights = Array1::<Weight>::zeros(entries.len());
        for (row, entry) in entries.iter().enumerate() {
            for (col, c) in entry.coords.iter().enumerate() {
                coords[[row, col]] = *c;
            }
            weights[row] = entry.weight;
        }
        group
            .new_dataset_builder()
            .with_data(&coords)
            .create(COORDS_NAME)?;
        group
            .new_dataset_builder()
            .with_data(&weights)
            .create(WEIGHTS_NAME)?;
        Ok(())
    }

    /// Replace the contents of this dataspace with the entries stored in the group.
    ///
    /// A group without datasets loads as empty. Anything structurally wrong is
    /// an error and leaves the dataspace untouched.
    pub fn load(&mut self, group: &hdf5::Group) -> Result<(), DataspaceError> {
        if !group.is_valid() {
            return Err(DataspaceError::InvalidGroup);
        }
        let expected = self.dimensions() as u32;
        if let Ok(attr) = group.attr(DIMENSIONS_ATTR) {
            let stored = attr.read_scalar::<u32>()?;
            if stored != expected {
                return Err(DataspaceError::DimensionMismatch(stored, expected));
            }
        }

        let coords_dset = group.dataset(COORDS_NAME).ok();
        let weights_dset = group.dataset(WEIGHTS_NAME).ok();
        let (coords_dset, weights_dset) = match (coords_dset, weights_dset) {
            (None, None) => {
                self.clear();
                return Ok(());
            }
            (Some(_), None) => return Err(DataspaceError::MissingColumn(WEIGHTS_NAME)),
            (None, Some(_)) => return Err(DataspaceError::MissingColumn(COORDS_NAME)),
            (Some(c), Some(w)) => (c, w),
        };

        let width = self.coordinate_width();
        let shape = coords_dset.shape();
        if shape.len() != 2 {
            return Err(DataspaceError::CoordinateWidth(
                shape.get(1).copied().unwrap_or(0),
                width,
            ));
        }
        let coords = coords_dset.read_2d::<u32>()?;
        let weights = weights_dset.read_1d::<Weight>()?;
        if coords.nrows() != weights.len() {
            return Err(DataspaceError::ColumnMismatch(coords.nrows(), weights.len()));
        }
        if coords.ncols() != width {
            return Err(DataspaceError::CoordinateWidth(coords.ncols(), width));
        }

        self.clear();
        let dimensions = self.dimensions();
        for (row, weight) in coords.rows().into_iter().zip(weights.iter()) {
            let point: Vec<u32> = row.iter().take(dimensions).copied().collect();
            self.add_weight(&point, *weight);
        }
        if let Ok(attr) = group.attr(TOTAL_COUNT_ATTR) {
            self.total_count = attr.read_scalar::<f64>()?;
        }
        self.recalc_axes();
        Ok(())
    }
}
