use hdf5::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::error::ProjectError;
use super::setting::Settings;
use super::spectrum::{Spectrum, SpectrumPrototype, METADATA_GROUP};
use super::spill::Spill;

const SPECTRA_NAME: &str = "spectra";
const VERSION_ATTR: &str = "version";
const SAVED_AT_ATTR: &str = "saved_at";
const COUNT_ATTR: &str = "count";
const INDEX_ATTR: &str = "index";

/// This is the version of the project file format
const FORMAT_VERSION: &str = "1.0";

// Structure
// project.h5 - version, saved_at
// |---- spectra - count
// |    |---- <name> - index
// |    |    |---- metadata - one attribute per setting
// |    |    |---- data - dimensions, total_count
// |    |    |    |---- coords(dset)
// |    |    |    |---- weights(dset)

/// An ordered collection of uniquely named spectra fed from one spill sequence.
///
/// Spectra are handed out as `Arc`s so readers can keep querying them while
/// spills are pushed.
#[derive(Default)]
pub struct Project {
    spectra: Vec<Arc<Spectrum>>,
    n_threads: usize,
}

impl Project {
    pub fn new(prototypes: &[SpectrumPrototype], n_threads: usize) -> Result<Self, ProjectError> {
        let mut project = Self {
            spectra: Vec::with_capacity(prototypes.len()),
            n_threads: n_threads.max(1),
        };
        for prototype in prototypes {
            project.add(prototype.clone())?;
        }
        Ok(project)
    }

    pub fn add(&mut self, prototype: SpectrumPrototype) -> Result<Arc<Spectrum>, ProjectError> {
        if self.get(&prototype.name).is_some() {
            return Err(ProjectError::DuplicateName(prototype.name));
        }
        let spectrum = Arc::new(Spectrum::new(prototype));
        self.spectra.push(spectrum.clone());
        Ok(spectrum)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Spectrum>> {
        let idx = self.spectra.iter().position(|s| s.name() == name)?;
        Some(self.spectra.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Spectrum>> {
        self.spectra.iter().find(|s| s.name() == name)
    }

    pub fn spectra(&self) -> &[Arc<Spectrum>] {
        &self.spectra
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Offer a spill to every spectrum, spread over the worker threads
    pub fn push_spill(&self, spill: &Spill) {
        if self.n_threads <= 1 || self.spectra.len() <= 1 {
            for spectrum in self.spectra.iter() {
                spectrum.push_spill(spill);
            }
            return;
        }
        let chunk_size = self.spectra.len().div_ceil(self.n_threads);
        std::thread::scope(|scope| {
            for chunk in self.spectra.chunks(chunk_size) {
                scope.spawn(move || {
                    for spectrum in chunk {
                        spectrum.push_spill(spill);
                    }
                });
            }
        });
    }

    pub fn flush(&self) {
        for spectrum in self.spectra.iter() {
            spectrum.flush();
        }
    }

    pub fn clear(&self) {
        for spectrum in self.spectra.iter() {
            spectrum.clear();
        }
    }

    /// Write every spectrum into a new file at path, replacing any existing file
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let file = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        Settings::new()
            .with(VERSION_ATTR, version)
            .with(
                SAVED_AT_ATTR,
                time::OffsetDateTime::now_utc().unix_timestamp(),
            )
            .write_attributes(&file)?;

        let spectra_group = file.create_group(SPECTRA_NAME)?;
        Settings::new()
            .with(COUNT_ATTR, self.spectra.len() as i64)
            .write_attributes(&spectra_group)?;
        for (idx, spectrum) in self.spectra.iter().enumerate() {
            let group = spectra_group.create_group(spectrum.name())?;
            Settings::new()
                .with(INDEX_ATTR, idx as i64)
                .write_attributes(&group)?;
            spectrum.save(&group)?;
        }
        spdlog::info!(
            "Saved {} spectra to {}",
            self.spectra.len(),
            path.display()
        );
        Ok(())
    }

    /// Rebuild a project from a saved file
    pub fn open(path: &Path, n_threads: usize) -> Result<Self, ProjectError> {
        if !path.exists() {
            return Err(ProjectError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let root = Settings::read_attributes(&file)?;
        if let Some(version) = root.get_text(VERSION_ATTR) {
            spdlog::info!("Opening project {} written by {}", path.display(), version);
        }

        let mut project = Self {
            spectra: Vec::new(),
            n_threads: n_threads.max(1),
        };
        if !file.link_exists(SPECTRA_NAME) {
            spdlog::warn!("Project {} holds no spectra", path.display());
            return Ok(project);
        }
        let spectra_group = file.group(SPECTRA_NAME)?;
        let mut groups = Vec::new();
        for group in spectra_group.groups()? {
            let index = Settings::read_attributes(&group)?
                .get_integer(INDEX_ATTR)
                .unwrap_or(i64::MAX);
            groups.push((index, group));
        }
        // Links come back in name order; restore the saved order
        groups.sort_by_key(|(index, _)| *index);
        for (_, group) in groups {
            if !group.link_exists(METADATA_GROUP) {
                spdlog::warn!(
                    "Skipping {}: it has no {} group to rebuild the spectrum from",
                    group.name(),
                    METADATA_GROUP
                );
                continue;
            }
            let spectrum = Spectrum::open(&group)?;
            if project.get(spectrum.name()).is_some() {
                return Err(ProjectError::DuplicateName(spectrum.name().to_string()));
            }
            project.spectra.push(Arc::new(spectrum));
        }
        Ok(project)
    }

    /// Write `<name>.csv` for every spectrum into dir
    pub fn export_csv(&self, dir: &Path) -> Result<(), ProjectError> {
        std::fs::create_dir_all(dir)?;
        for spectrum in self.spectra.iter() {
            let path = dir.join(format!("{}.csv", spectrum.name()));
            let mut writer = std::io::BufWriter::new(std::fs::File::create(&path)?);
            spectrum.export_csv(&mut writer)?;
            writer.flush()?;
            spdlog::info!("Exported {} to {}", spectrum.name(), path.display());
        }
        Ok(())
    }
}
