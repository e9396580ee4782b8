//! Storage for N-dimensional weighted counts.
//!
//! A [`Dataspace`] owns one storage variant (see [`StorageKind`]), one [`Axis`] per
//! dimension, the running total and the largest coordinate observed in each
//! dimension ("limits"). The storage variants only deal with validated coordinates;
//! arity checks, zero weight rejection and bookkeeping all happen here, so every
//! variant answers `get`/`range` identically for the same sequence of writes.
pub mod dense_matrix;
pub mod export;
pub mod persist;
pub mod scalar;
pub mod sparse_map;
pub mod sparse_matrix;

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::calibration::Axis;
use super::error::PrototypeError;
use dense_matrix::DenseMatrix;
use scalar::Scalar;
use sparse_map::SparseMap;
use sparse_matrix::SparseMatrix;

/// Accumulation type of every dataspace.
///
/// Integer counts are exact up to 2^53 per bin and in `total_count`; past that
/// both the in-memory value and the persisted `weights` / `total_count` round
/// to the nearest representable f64.
pub type Weight = f64;

/// A coordinate paired with its weight
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub coords: Vec<u32>,
    pub weight: Weight,
}

impl Entry {
    pub fn new(coords: Vec<u32>, weight: Weight) -> Self {
        Self { coords, weight }
    }
}

/// The contract every storage variant fulfills.
///
/// Coordinates handed to a BinStore always have the right arity, weights are
/// never zero, and range bounds are inclusive, one pair per dimension.
pub trait BinStore {
    fn get(&self, coords: &[u32]) -> Weight;
    fn add(&mut self, coords: &[u32], weight: Weight);
    fn add_one(&mut self, coords: &[u32]) {
        self.add(coords, 1.0)
    }
    /// Non-zero entries within bounds, ascending, dimension 0 major
    fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry>;
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Scalar,
    SparseMap,
    SparseMatrix,
    DenseMatrix,
}

impl StorageKind {
    /// Can this storage hold data of the given dimensionality?
    pub fn supports(&self, dimensions: usize) -> bool {
        match self {
            Self::Scalar => dimensions == 0,
            Self::SparseMap => dimensions >= 1,
            Self::SparseMatrix | Self::DenseMatrix => dimensions == 2,
        }
    }
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::SparseMap => "sparse_map",
            Self::SparseMatrix => "sparse_matrix",
            Self::DenseMatrix => "dense_matrix",
        };
        write!(f, "{name}")
    }
}

impl FromStr for StorageKind {
    type Err = PrototypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalar" => Ok(Self::Scalar),
            "sparse_map" => Ok(Self::SparseMap),
            "sparse_matrix" => Ok(Self::SparseMatrix),
            "dense_matrix" => Ok(Self::DenseMatrix),
            _ => Err(PrototypeError::UnknownStorage(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Storage {
    Scalar(Scalar),
    SparseMap(SparseMap),
    SparseMatrix(SparseMatrix),
    DenseMatrix(DenseMatrix),
}

impl Storage {
    fn new(kind: StorageKind, dimensions: usize) -> Self {
        match kind {
            StorageKind::Scalar => Self::Scalar(Scalar::default()),
            StorageKind::SparseMap => Self::SparseMap(SparseMap::new(dimensions)),
            StorageKind::SparseMatrix => Self::SparseMatrix(SparseMatrix::default()),
            StorageKind::DenseMatrix => Self::DenseMatrix(DenseMatrix::default()),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            Self::Scalar(_) => StorageKind::Scalar,
            Self::SparseMap(_) => StorageKind::SparseMap,
            Self::SparseMatrix(_) => StorageKind::SparseMatrix,
            Self::DenseMatrix(_) => StorageKind::DenseMatrix,
        }
    }

    fn store(&self) -> &dyn BinStore {
        match self {
            Self::Scalar(s) => s,
            Self::SparseMap(s) => s,
            Self::SparseMatrix(s) => s,
            Self::DenseMatrix(s) => s,
        }
    }
}

impl BinStore for Storage {
    fn get(&self, coords: &[u32]) -> Weight {
        self.store().get(coords)
    }

    fn add(&mut self, coords: &[u32], weight: Weight) {
        match self {
            Self::Scalar(s) => s.add(coords, weight),
            Self::SparseMap(s) => s.add(coords, weight),
            Self::SparseMatrix(s) => s.add(coords, weight),
            Self::DenseMatrix(s) => s.add(coords, weight),
        }
    }

    fn add_one(&mut self, coords: &[u32]) {
        match self {
            Self::Scalar(s) => s.add_one(coords),
            Self::SparseMap(s) => s.add_one(coords),
            Self::SparseMatrix(s) => s.add_one(coords),
            Self::DenseMatrix(s) => s.add_one(coords),
        }
    }

    fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        self.store().range(bounds)
    }

    fn clear(&mut self) {
        match self {
            Self::Scalar(s) => s.clear(),
            Self::SparseMap(s) => s.clear(),
            Self::SparseMatrix(s) => s.clear(),
            Self::DenseMatrix(s) => s.clear(),
        }
    }
}

/// The N-dimensional count storage owned by one Spectrum.
#[derive(Debug, Clone)]
pub struct Dataspace {
    storage: Storage,
    axes: Vec<Axis>,
    limits: Option<Vec<u32>>,
    total_count: Weight,
}

impl Dataspace {
    /// Create a dataspace with one dimension per axis.
    ///
    /// A storage kind that cannot hold this dimensionality is replaced by the
    /// sparse map (or the scalar for zero dimensions).
    pub fn new(kind: StorageKind, axes: Vec<Axis>) -> Self {
        let dimensions = axes.len();
        let kind = if kind.supports(dimensions) {
            kind
        } else {
            let fallback = if dimensions == 0 {
                StorageKind::Scalar
            } else {
                StorageKind::SparseMap
            };
            spdlog::warn!(
                "Storage {} cannot hold {} dimensions; using {} instead",
                kind,
                dimensions,
                fallback
            );
            fallback
        };
        Self {
            storage: Storage::new(kind, dimensions),
            axes,
            limits: None,
            total_count: 0.0,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.axes.len()
    }

    pub fn kind(&self) -> StorageKind {
        self.storage.kind()
    }

    pub fn total_count(&self) -> Weight {
        self.total_count
    }

    /// Largest coordinate seen per dimension, None if nothing was ever added
    pub fn limits(&self) -> Option<&[u32]> {
        self.limits.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_none()
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, dimension: usize) -> Option<&Axis> {
        self.axes.get(dimension)
    }

    pub fn axis_mut(&mut self, dimension: usize) -> Option<&mut Axis> {
        self.axes.get_mut(dimension)
    }

    /// Physical values of each bin along a dimension
    pub fn axis_values(&self, dimension: usize) -> Vec<f64> {
        self.axes
            .get(dimension)
            .map(|a| a.domain())
            .unwrap_or_default()
    }

    /// Physical values of the bins `lo..=hi` along a dimension
    pub fn axis_values_in(&self, dimension: usize, lo: u32, hi: u32) -> Vec<f64> {
        self.axes
            .get(dimension)
            .map(|a| a.values(lo, hi))
            .unwrap_or_default()
    }

    /// Weight at coords; zero if absent or if the arity is wrong
    pub fn get(&self, coords: &[u32]) -> Weight {
        if coords.len() != self.dimensions() {
            return 0.0;
        }
        self.storage.get(coords)
    }

    pub fn add(&mut self, entry: &Entry) {
        self.add_weight(&entry.coords, entry.weight);
    }

    pub fn add_weight(&mut self, coords: &[u32], weight: Weight) {
        if coords.len() != self.dimensions() || weight == 0.0 || weight.is_nan() {
            return;
        }
        self.storage.add(coords, weight);
        self.bump_limits(coords);
        self.total_count += weight;
    }

    /// The per-event hot path
    pub fn add_one(&mut self, coords: &[u32]) {
        if coords.len() != self.dimensions() {
            return;
        }
        self.storage.add_one(coords);
        self.bump_limits(coords);
        self.total_count += 1.0;
    }

    fn bump_limits(&mut self, coords: &[u32]) {
        match self.limits.as_mut() {
            Some(limits) => {
                for (limit, c) in limits.iter_mut().zip(coords.iter()) {
                    if *c > *limit {
                        *limit = *c;
                    }
                }
            }
            None => self.limits = Some(coords.to_vec()),
        }
    }

    /// Non-zero entries inside the inclusive bounds, ascending, dimension 0 major.
    ///
    /// Empty bounds mean the full observed range. Bounds of the wrong arity
    /// yield nothing.
    pub fn range(&self, bounds: &[(u32, u32)]) -> Vec<Entry> {
        let limits = match self.limits.as_ref() {
            Some(l) => l,
            None => return Vec::new(),
        };
        if bounds.is_empty() {
            let full: Vec<(u32, u32)> = limits.iter().map(|l| (0, *l)).collect();
            return self.storage.range(&full);
        }
        if bounds.len() != self.dimensions() {
            return Vec::new();
        }
        let mut clamped = Vec::with_capacity(bounds.len());
        for ((lo, hi), limit) in bounds.iter().zip(limits.iter()) {
            let hi = (*hi).min(*limit);
            if *lo > hi {
                return Vec::new();
            }
            clamped.push((*lo, hi));
        }
        self.storage.range(&clamped)
    }

    /// Grow each axis domain to match the observed limits
    pub fn recalc_axes(&mut self) {
        if let Some(limits) = self.limits.as_ref() {
            for (axis, limit) in self.axes.iter_mut().zip(limits.iter()) {
                axis.expand_domain(*limit as usize + 1);
            }
        }
    }

    /// Drop all weights, keeping the axis calibrations
    pub fn clear(&mut self) {
        self.storage.clear();
        self.limits = None;
        self.total_count = 0.0;
        for axis in self.axes.iter_mut() {
            axis.clear_domain();
        }
    }
}
