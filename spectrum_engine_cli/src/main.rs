use clap::{Arg, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::Arc;

use libspectrum_engine::config::Config;
use libspectrum_engine::process::{export, process};
use libspectrum_engine::worker_status::{BarColor, ReplayStatus};

fn make_template_config(path: &Path) {
    let config = Config::default();
    if let Err(e) = config.write_config_file(path) {
        spdlog::error!("Could not write template config: {e}");
    }
}

fn bar_style(color: BarColor) -> ProgressStyle {
    let (label, bar) = match color {
        BarColor::CYAN => ("Replaying", "cyan/blue"),
        BarColor::GREEN => ("Saving", "green/white"),
        BarColor::MAGENTA => ("Exporting", "magenta/white"),
    };
    ProgressStyle::with_template(&format!("{label:>10} [{{bar:40.{bar}}}] {{percent}}% {{msg}}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn init_logging() {
    // Keep the terminal sinks of the default logger and add a log file
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./spectrum_engine.log"))
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create the log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sinks(spdlog::default_logger().sinks().iter().cloned())
            .sink(file_sink)
            .build()
            .expect("Could not create the logger!"),
    );
    spdlog::set_default_logger(logger);
}

fn run(config_path: &Path) {
    spdlog::info!("Loading config from {}...", config_path.display());
    let config = match Config::read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        spdlog::error!("n_threads must be at least 1, got {}", config.n_threads);
        return;
    }
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Spill Path: {}", config.spill_path.display());
    spdlog::info!("HDF5 Path: {}", config.hdf_path.display());
    if let Some(csv) = &config.csv_path {
        spdlog::info!("CSV Path: {}", csv.display());
    }
    spdlog::info!("Number of Spectra: {}", config.spectra.len());
    spdlog::info!("Number of Threads: {}", config.n_threads);

    let pb = ProgressBar::new(100);
    let mut color = BarColor::CYAN;
    pb.set_style(bar_style(color));

    let (tx, rx) = channel::<ReplayStatus>();
    let handle = std::thread::spawn(move || process(config, tx));

    // Ends once the worker drops its sender
    for status in rx.iter() {
        if status.color != color {
            color = status.color;
            pb.set_style(bar_style(color));
        }
        if status.color == BarColor::CYAN {
            pb.set_message(format!("spill {}", status.spill_index));
        } else {
            pb.set_message("");
        }
        pb.set_position((status.progress * 100.0) as u64);
    }
    pb.finish();

    match handle.join() {
        Ok(result) => match result {
            Ok(_) => spdlog::info!("Successfully replayed spills!"),
            Err(e) => spdlog::error!("Replay failed with error: {e}"),
        },
        Err(_) => spdlog::error!("Failed to join replay task!"),
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("spectrum_engine_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("run").about("Replay spills into a project as configured"))
        .subcommand(
            Command::new("export")
                .about("Export every spectrum of a saved project as CSV")
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .required(true)
                        .help("Directory for the CSV files"),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    init_logging();

    // Parse the cli
    let path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    match matches.subcommand() {
        Some(("new", _)) => {
            spdlog::info!("Making a template config at {}...", path.display());
            make_template_config(&path);
        }
        Some(("run", _)) => run(&path),
        Some(("export", sub)) => {
            let output = PathBuf::from(sub.get_one::<String>("output").expect("We require args"));
            if let Err(e) = export(&path, &output) {
                spdlog::error!("Export failed with error: {e}");
            }
        }
        _ => spdlog::error!("Unknown subcommand, see --help"),
    }

    spdlog::info!("Done.");
}
