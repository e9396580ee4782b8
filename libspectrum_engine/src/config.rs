use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use super::filter::FilterConfig;
use super::spectrum::{SpectrumKind, SpectrumPrototype};

/// Structure representing a replay configuration. Contains pathing and the spectra to build
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub spill_path: PathBuf,
    pub hdf_path: PathBuf,
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    pub n_threads: i32,
    #[serde(default)]
    pub spectra: Vec<SpectrumPrototype>,
}

impl Default for Config {
    /// Generate a new Config object with one example spectrum. Paths are placeholders
    fn default() -> Self {
        Self {
            spill_path: PathBuf::from("None"),
            hdf_path: PathBuf::from("None"),
            csv_path: None,
            n_threads: 1,
            spectra: vec![
                SpectrumPrototype::new("energy", SpectrumKind::Histogram1D, "adc")
                    .with_value("energy", 0)
                    .with_filter(FilterConfig {
                        enabled: false,
                        value_id: String::from("energy"),
                        min: 0,
                        max: u32::MAX,
                    }),
            ],
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration as YAML
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn has_csv_path(&self) -> bool {
        self.csv_path.is_some()
    }

    pub fn does_spill_file_exist(&self) -> bool {
        self.spill_path.exists()
    }
}
