use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use super::error::PrototypeError;

/// Mapping from a raw (full resolution) channel to a physical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calibration {
    Affine { offset: f64, slope: f64 },
    /// One physical value per raw channel. Past the end of the table the last
    /// two entries are extrapolated linearly.
    Table { values: Vec<f64> },
}

impl Default for Calibration {
    fn default() -> Self {
        Self::Affine {
            offset: 0.0,
            slope: 1.0,
        }
    }
}

impl Calibration {
    pub fn affine(offset: f64, slope: f64) -> Self {
        Self::Affine { offset, slope }
    }

    pub fn transform(&self, raw: f64) -> f64 {
        match self {
            Self::Affine { offset, slope } => offset + slope * raw,
            Self::Table { values } => match values.len() {
                0 => raw,
                1 => values[0],
                n => {
                    let idx = raw.floor();
                    if idx >= 0.0 && (idx as usize) < n - 1 {
                        let i = idx as usize;
                        let frac = raw - idx;
                        values[i] + (values[i + 1] - values[i]) * frac
                    } else if idx < 0.0 {
                        values[0] + (values[1] - values[0]) * raw
                    } else {
                        let step = values[n - 1] - values[n - 2];
                        values[n - 1] + step * (raw - (n - 1) as f64)
                    }
                }
            },
        }
    }
}

impl Display for Calibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Affine { offset, slope } => write!(f, "affine:{offset},{slope}"),
            Self::Table { values } => {
                let joined: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "table:{}", joined.join(","))
            }
        }
    }
}

impl FromStr for Calibration {
    type Err = PrototypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PrototypeError::BadCalibration(s.to_string());
        let (kind, body) = s.split_once(':').ok_or_else(bad)?;
        let numbers = body
            .split_terminator(',')
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| bad())?;
        match kind.trim() {
            "affine" if numbers.len() == 2 => Ok(Self::Affine {
                offset: numbers[0],
                slope: numbers[1],
            }),
            "table" => Ok(Self::Table { values: numbers }),
            _ => Err(bad()),
        }
    }
}

/// One axis of a Dataspace.
///
/// Bin `i` covers the raw channels `i << resample_shift ..`, so the calibration is
/// evaluated on the shifted index. Only the number of covered bins is stored; bin
/// values are computed when asked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Axis {
    pub calibration: Calibration,
    pub resample_shift: u8,
    pub units: String,
    size: usize,
}

impl Axis {
    pub fn new(calibration: Calibration, resample_shift: u8, units: &str) -> Self {
        Self {
            calibration,
            resample_shift,
            units: units.to_string(),
            size: 0,
        }
    }

    pub fn bin_to_value(&self, bin: u32) -> f64 {
        // u32 bins shifted by up to 31 fit a u64 exactly
        let raw = match (bin as u64).checked_shl(self.resample_shift as u32) {
            Some(raw) if self.resample_shift < 32 => raw as f64,
            _ => bin as f64 * 2f64.powi(self.resample_shift as i32),
        };
        self.calibration.transform(raw)
    }

    /// Grow the domain to cover `size` bins. Never shrinks.
    pub fn expand_domain(&mut self, size: usize) {
        self.size = self.size.max(size);
    }

    /// Swap the calibration, keeping the domain size
    pub fn recalibrate(&mut self, calibration: Calibration) {
        self.calibration = calibration;
    }

    pub fn clear_domain(&mut self) {
        self.size = 0;
    }

    /// Values of the bins `lo..=hi`, clipped to the domain
    pub fn values(&self, lo: u32, hi: u32) -> Vec<f64> {
        if self.size == 0 || lo as usize >= self.size {
            return Vec::new();
        }
        let hi = hi.min((self.size - 1) as u32);
        (lo..=hi).map(|bin| self.bin_to_value(bin)).collect()
    }

    /// Values of every bin in the domain
    pub fn domain(&self) -> Vec<f64> {
        self.values(0, u32::MAX)
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_axis() {
        let mut axis = Axis::new(Calibration::affine(1.0, 0.5), 0, "keV");
        axis.expand_domain(3);
        assert_eq!(axis.domain(), vec![1.0, 1.5, 2.0]);
        axis.expand_domain(2);
        assert_eq!(axis.size(), 3);
        assert_eq!(axis.values(1, 10), vec![1.5, 2.0]);
        assert!(axis.values(3, 4).is_empty());
    }

    #[test]
    fn test_wide_axis_stores_no_values() {
        let mut axis = Axis::new(Calibration::default(), 0, "ns");
        axis.expand_domain(300_000_001);
        assert_eq!(axis.size(), 300_000_001);
        assert_eq!(axis.bin_to_value(300_000_000), 3.0e8);
        assert_eq!(axis.values(299_999_999, u32::MAX), vec![299_999_999.0, 3.0e8]);
    }

    #[test]
    fn test_oversized_shift_does_not_overflow() {
        let axis = Axis::new(Calibration::default(), 64, "");
        assert_eq!(axis.bin_to_value(0), 0.0);
        assert_eq!(axis.bin_to_value(1), 2f64.powi(64));
        let axis = Axis::new(Calibration::default(), u8::MAX, "");
        assert!(axis.bin_to_value(3).is_finite());
    }

    #[test]
    fn test_shifted_axis() {
        let mut axis = Axis::new(Calibration::default(), 2, "");
        axis.expand_domain(3);
        assert_eq!(axis.domain(), vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_table_calibration() {
        let cal = Calibration::Table {
            values: vec![10.0, 20.0, 40.0],
        };
        assert_eq!(cal.transform(0.0), 10.0);
        assert_eq!(cal.transform(1.5), 30.0);
        assert_eq!(cal.transform(2.0), 40.0);
        assert_eq!(cal.transform(3.0), 60.0);
    }

    #[test]
    fn test_calibration_text() {
        let cal: Calibration = "affine:2,0.25".parse().unwrap();
        assert_eq!(cal, Calibration::affine(2.0, 0.25));
        let text = cal.to_string();
        assert_eq!(text.parse::<Calibration>().unwrap(), cal);
        let table: Calibration = "table:1,2,3".parse().unwrap();
        assert_eq!(table.to_string().parse::<Calibration>().unwrap(), table);
        assert!("linear:1".parse::<Calibration>().is_err());
        assert!("affine:1".parse::<Calibration>().is_err());
    }

    #[test]
    fn test_recalibrate_keeps_size() {
        let mut axis = Axis::new(Calibration::default(), 0, "");
        axis.expand_domain(2);
        axis.recalibrate(Calibration::affine(0.0, 2.0));
        assert_eq!(axis.domain(), vec![0.0, 2.0]);
    }
}
