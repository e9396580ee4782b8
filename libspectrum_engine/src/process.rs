use std::path::Path;
use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::ProcessorError;
use super::project::Project;
use super::spill::read_spill_file;
use super::worker_status::{BarColor, ReplayStatus};

/// How often (as a fraction of the spills) progress is reported
const PROGRESS_STEP: f32 = 0.01;

/// The main loop of spectrum_engine.
///
/// Reads the spills named by the config, pushes them through a freshly built
/// project, flushes it and returns it. Progress goes through tx.
pub fn replay(config: &Config, tx: &Sender<ReplayStatus>) -> Result<Project, ProcessorError> {
    let spills = read_spill_file(&config.spill_path)?;
    let file_size = std::fs::metadata(&config.spill_path)?.len();
    spdlog::info!(
        "Read {} spills from {} ({})",
        spills.len(),
        config.spill_path.display(),
        human_bytes::human_bytes(file_size as f64)
    );
    let project = Project::new(&config.spectra, config.n_threads.max(1) as usize)?;
    spdlog::info!("Replaying into {} spectra...", project.len());

    tx.send(ReplayStatus::new(0.0, 0, BarColor::CYAN))?;
    let total = spills.len().max(1) as f32;
    let mut reported: f32 = 0.0;
    for (idx, spill) in spills.iter().enumerate() {
        project.push_spill(spill);
        let progress = (idx + 1) as f32 / total;
        if progress - reported >= PROGRESS_STEP {
            reported = progress;
            tx.send(ReplayStatus::new(progress, idx + 1, BarColor::CYAN))?;
        }
    }
    project.flush();
    tx.send(ReplayStatus::new(1.0, spills.len(), BarColor::CYAN))?;
    spdlog::info!("Done replaying spills.");
    Ok(project)
}

/// The function to be called by a separate thread (typically the UI).
///
/// Replays the spills, saves the project and exports CSV files if asked.
pub fn process(config: Config, tx: Sender<ReplayStatus>) -> Result<(), ProcessorError> {
    let project = replay(&config, &tx)?;

    tx.send(ReplayStatus::new(0.0, 0, BarColor::GREEN))?;
    project.save(&config.hdf_path)?;
    tx.send(ReplayStatus::new(1.0, 0, BarColor::GREEN))?;

    if let Some(csv_path) = &config.csv_path {
        tx.send(ReplayStatus::new(0.0, 0, BarColor::MAGENTA))?;
        project.export_csv(csv_path)?;
        tx.send(ReplayStatus::new(1.0, 0, BarColor::MAGENTA))?;
    }
    Ok(())
}

/// Open a saved project and export every spectrum as CSV
pub fn export(project_path: &Path, csv_path: &Path) -> Result<(), ProcessorError> {
    let project = Project::open(project_path, 1)?;
    spdlog::info!(
        "Exporting {} spectra from {} to {}",
        project.len(),
        project_path.display(),
        csv_path.display()
    );
    project.export_csv(csv_path)?;
    Ok(())
}
