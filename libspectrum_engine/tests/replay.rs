use std::sync::mpsc::channel;

use libspectrum_engine::config::Config;
use libspectrum_engine::process::{export, process};
use libspectrum_engine::project::Project;
use libspectrum_engine::spectrum::Status;
use libspectrum_engine::worker_status::BarColor;

const SPILLS: &str = r#"
- stream_id: adc
  kind: start
  state:
    native_time: 1000000000
- stream_id: adc
  event_model:
    timebase: { multiplier: 10, divider: 1 }
    values: { energy: 0, psd: 1 }
  events:
    - { channel: 0, timestamp: 100, values: [0, 500] }
    - { channel: 1, timestamp: 101, values: [9, 500] }
    - { channel: 0, timestamp: 500, values: [11, 50] }
  state:
    native_time: 2000000000
    pulse_time: 900
- stream_id: tdc
  event_model:
    values: { energy: 0 }
  events:
    - { channel: 0, timestamp: 7, values: [7] }
- stream_id: adc
  kind: stop
  state:
    native_time: 3000000000
    live_time: 1500000000
"#;

const CONFIG: &str = r#"
n_threads: 2
spectra:
  - name: energy
    type: histogram1d
    stream_id: adc
    values:
      - value_id: energy
        downsample: 2
  - name: gated
    type: histogram1d
    stream_id: adc
    values:
      - value_id: energy
    filters:
      - value_id: psd
        min: 100
  - name: events
    type: counter
    stream_id: adc
  - name: pairs
    type: coincidence1d
    stream_id: adc
    values:
      - value_id: energy
    coinc_window: 50.0
    channels:
      - {}
      - {}
    pattern_coinc: "11"
  - name: missing
    type: histogram2d
    stream_id: adc
    values:
      - value_id: energy
      - value_id: charge
"#;

fn write_inputs(dir: &std::path::Path) -> Config {
    let spill_path = dir.join("spills.yml");
    std::fs::write(&spill_path, SPILLS).unwrap();
    let config: Config = serde_yaml::from_str(&format!(
        "spill_path: {}\nhdf_path: {}\ncsv_path: {}\n{}",
        spill_path.display(),
        dir.join("project.h5").display(),
        dir.join("csv").display(),
        CONFIG
    ))
    .unwrap();
    config
}

#[test]
fn replay_save_open_export() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    let hdf_path = config.hdf_path.clone();

    let (tx, rx) = channel();
    process(config, tx).unwrap();
    let statuses: Vec<_> = rx.iter().collect();
    assert!(statuses
        .iter()
        .any(|s| s.color == BarColor::CYAN && s.progress == 1.0));
    assert!(statuses.iter().any(|s| s.color == BarColor::MAGENTA));

    let project = Project::open(&hdf_path, 1).unwrap();
    let names: Vec<&str> = project.spectra().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["energy", "gated", "events", "pairs", "missing"]);

    let energy = project.get("energy").unwrap();
    assert_eq!(energy.data().get(&[0]), 1.0);
    assert_eq!(energy.data().get(&[2]), 2.0);
    assert_eq!(energy.data().total_count(), 3.0);
    let meta = energy.metadata();
    assert_eq!(meta.get_floating("real_time"), Some(2.0e9));
    assert_eq!(meta.get_floating("live_time"), Some(1.5e9));

    let gated = project.get("gated").unwrap();
    assert_eq!(gated.data().total_count(), 2.0);
    assert_eq!(gated.data().get(&[11]), 0.0);

    assert_eq!(project.get("events").unwrap().data().get(&[]), 3.0);

    // Hits at 1000 and 1010 ns pair up; the lone hit at 5000 ns fails the pattern
    let pairs = project.get("pairs").unwrap();
    assert_eq!(pairs.data().get(&[0]), 1.0);
    assert_eq!(pairs.data().get(&[9]), 1.0);
    assert_eq!(pairs.data().get(&[11]), 0.0);

    let missing = project.get("missing").unwrap();
    assert!(missing.data().is_empty());
    assert_eq!(missing.status(), Status::Unconfigured);

    let csv = std::fs::read_to_string(dir.path().join("csv").join("energy.csv")).unwrap();
    assert_eq!(csv, "1,0,2\n");
}

#[test]
fn export_saved_project() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_inputs(dir.path());
    config.csv_path = None;
    let hdf_path = config.hdf_path.clone();
    let (tx, _rx) = channel();
    process(config, tx).unwrap();

    let out = dir.path().join("exported");
    export(&hdf_path, &out).unwrap();
    let csv = std::fs::read_to_string(out.join("events.csv")).unwrap();
    assert_eq!(csv, "3\n");
}
