//! # spectrum_engine
//!
//! spectrum_engine is a histogramming engine for detector data acquisition, written in
//! Rust. It consumes spills of time-stamped, multi-valued detector events and accumulates
//! them into calibrated N-dimensional spectra, with filtering, down-sampling, coincidence
//! grouping and time-of-flight correlation against a reference stream. Spectra can be
//! read while they fill and are saved to (and opened from) HDF5 project files.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will
//! most likely need to install the Rust tool chain. See the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! ### HDF5
//!
//! Before building spectrum_engine, HDF5 must be installed. Typically this will be
//! installed using a package manager (homebrew, apt, etc), and the Rust libraries will
//! auto detect the location of the HDF install. If HDF5 lives in a custom location, write
//! the following snippet into the file `.cargo/config.toml` in the repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./spectrum_engine_cli` from the
//! top level repository.
//!
//! ## Configuration
//!
//! A replay is driven by a YAML configuration:
//!
//! ```yml
//! spill_path: spills.yml
//! hdf_path: project.h5
//! csv_path: null
//! n_threads: 2
//! spectra:
//! - name: energy
//!   type: histogram1d
//!   stream_id: adc
//!   values:
//!   - value_id: energy
//!     downsample: 2
//!   filters:
//!   - value_id: psd
//!     min: 100
//!     max: 900
//! ```
//!
//! Spectrum types are `counter`, `histogram1d`, `histogram2d`, `histogram3d`, `image`,
//! `time_of_flight`, `time_of_flight_value`, `time_delta`, `rate_window`,
//! `coincidence1d` and `coincidence2d`. See [`spectrum::SpectrumPrototype`] for every
//! field.
//!
//! The spill file is a YAML list of [`spill::Spill`] records in delivery order.
//!
//! ## Output
//!
//! ### HDF5 Data Format
//!
//! ```text
//! project.h5 - version, saved_at
//! |---- spectra - count
//! |    |---- <name> - index
//! |    |    |---- metadata - one attribute per setting
//! |    |    |---- data - dimensions, total_count
//! |    |    |    |---- coords(dset)
//! |    |    |    |---- weights(dset)
//! ```
//!
//! `coords` is a `u32` matrix with one row per non-zero bin; `weights` holds the
//! matching `f64` weights.
//!
//! ### CSV
//!
//! 1-D spectra are one line of weights. 2-D spectra are one line per row, ended by `;`.
//! 3-D spectra are a 2-D block per x index, headed by `x=<index>`.
pub mod calibration;
pub mod coincidence;
pub mod config;
pub mod dataspace;
pub mod error;
pub mod event;
pub mod filter;
pub mod process;
pub mod project;
pub mod setting;
pub mod spectrum;
pub mod spill;
pub mod worker_status;
