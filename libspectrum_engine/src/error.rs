use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::ReplayStatus;

#[derive(Debug, Clone, Error)]
pub enum PrototypeError {
    #[error("Spectrum prototype is missing required setting {0}")]
    MissingKey(String),
    #[error("Spectrum prototype setting {0} has an invalid value: {1}")]
    BadValue(String, String),
    #[error("Unknown spectrum type {0}")]
    UnknownKind(String),
    #[error("Unknown storage type {0}")]
    UnknownStorage(String),
    #[error("Unknown time units {0}; expected one of ns, us, ms, s")]
    UnknownTimeUnits(String),
    #[error("Invalid channel pattern {0}; expected a string of 0 and 1")]
    BadPattern(String),
    #[error("Invalid calibration {0}; expected affine:offset,slope or table:v0,v1,...")]
    BadCalibration(String),
}

#[derive(Debug, Error)]
pub enum DataspaceError {
    #[error("Dataspace failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Dataspace was given an invalid group handle")]
    InvalidGroup,
    #[error("Dataspace dimension mismatch -- stored: {0} expected: {1}")]
    DimensionMismatch(u32, u32),
    #[error("Dataspace found {0} coordinate rows but {1} weights")]
    ColumnMismatch(usize, usize),
    #[error("Dataspace coordinate column has width {0}; expected {1}")]
    CoordinateWidth(usize, usize),
    #[error("Dataspace data group is missing the {0} column")]
    MissingColumn(&'static str),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Settings attribute {0} has an unsupported type")]
    UnsupportedType(String),
    #[error("Settings failed to convert text: {0}")]
    TextError(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SpectrumError {
    #[error("Spectrum failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Spectrum failed due to Dataspace error: {0}")]
    DataspaceError(#[from] DataspaceError),
    #[error("Spectrum failed due to Settings error: {0}")]
    SettingsError(#[from] SettingsError),
    #[error("Spectrum failed due to prototype error: {0}")]
    PrototypeError(#[from] PrototypeError),
    #[error("Spectrum failed due to export error: {0}")]
    ExportError(#[from] ExportError),
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Project failed due to Spectrum error: {0}")]
    SpectrumError(#[from] SpectrumError),
    #[error("Project failed due to Settings error: {0}")]
    SettingsError(#[from] SettingsError),
    #[error("Project failed due to export error: {0}")]
    ExportError(#[from] ExportError),
    #[error("Project failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Project already contains a spectrum named {0}")]
    DuplicateName(String),
    #[error("Could not open project as file {0:?} does not exist")]
    BadFilePath(PathBuf),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum SpillFileError {
    #[error("Could not open spill file as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Spill file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Spill file failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to spill file error: {0}")]
    SpillFileError(#[from] SpillFileError),
    #[error("Processor failed due to Project error: {0}")]
    ProjectError(#[from] ProjectError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<ReplayStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
