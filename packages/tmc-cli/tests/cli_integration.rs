use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn tmc() -> Command {
    Command::cargo_bin("tmc").unwrap()
}

fn log_stamp(t: i64) -> String {
    chrono::DateTime::from_timestamp(t, 0)
        .unwrap()
        .format("%Y/%m/%d-%H:%M:%S")
        .to_string()
}

/// Write a full set of constant-value channel logs (system channel 13, so
/// auxiliary data lives in ADC column 2 / board column 0) and a file list
/// pointing at them. Returns the file list path.
fn write_run_logs(dir: &Path, samples: usize) -> PathBuf {
    let t0: i64 = 1_457_630_000;
    let specs: [(&str, &str); 5] = [
        ("tmc-13_2N2222.log", "0.000150"),
        ("TestCurrent.log", "0.001 0.002 0.010"),
        ("ADCBaseline.log", "0.0 0.0 0.000100"),
        ("ADCTemps.log", "20.0 21.0 25.0"),
        ("BoardTemps.log", "298.0"),
    ];
    for (name, payload) in specs {
        let mut f = File::create(dir.join(name)).unwrap();
        for i in 0..samples {
            writeln!(f, "{}\t{}", log_stamp(t0 + 3 * i as i64), payload).unwrap();
        }
    }
    let list = dir.join("files.txt");
    let mut f = File::create(&list).unwrap();
    writeln!(f, "# generated channel logs").unwrap();
    for (name, _) in specs {
        writeln!(f, "{}", name).unwrap();
    }
    list
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    tmc()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    tmc()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tmc"));
}

#[test]
fn test_help_flag() {
    tmc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("residual noise"));
}

// =============================================================================
// CHANNELS SUBCOMMAND
// =============================================================================

#[test]
fn test_channels_subcommand() {
    tmc()
        .arg("channels")
        .assert()
        .success()
        .stdout(predicate::str::contains("target_voltage"))
        .stdout(predicate::str::contains("excitation_current"))
        .stdout(predicate::str::contains("baseline"))
        .stdout(predicate::str::contains("adc_temp"))
        .stdout(predicate::str::contains("board_temp"));
}

#[test]
fn test_channels_json() {
    let output = tmc().arg("channels").arg("--json").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 5);
    let names: Vec<&str> = arr
        .iter()
        .map(|v| v.get("name").unwrap().as_str().unwrap())
        .collect();
    assert!(names.contains(&"target_voltage"));
    assert!(names.contains(&"board_temp"));
}

// =============================================================================
// VALIDATE SUBCOMMAND
// =============================================================================

#[test]
fn test_validate_good_log() {
    let dir = tempfile::tempdir().unwrap();
    write_run_logs(dir.path(), 10);
    let output = tmc()
        .arg("validate")
        .arg("--file")
        .arg(dir.path().join("tmc-13_2N2222.log"))
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["channel"], "target_voltage");
    assert_eq!(parsed["samples"], 10);
    assert!(parsed["error"].is_null());
}

#[test]
fn test_validate_missing_file() {
    tmc()
        .arg("validate")
        .arg("--file")
        .arg("/nonexistent/ADCBaseline.log")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_validate_unrecognized_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
    tmc()
        .arg("validate")
        .arg("--file")
        .arg(dir.path().join("notes.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unrecognized"));
}

// =============================================================================
// RUN SUBCOMMAND
// =============================================================================

#[test]
fn test_run_requires_an_input_source() {
    tmc()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file-list"));
}

#[test]
fn test_run_end_to_end_constant_logs() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_run_logs(dir.path(), 60);

    let output = tmc()
        .arg("run")
        .arg("--file-list")
        .arg(&list)
        .arg("--drift-window")
        .arg("10")
        .arg("--quiet")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    // constant channels: corrected value is exactly the worked example
    let corrected = parsed["corrected"]["values"].as_array().unwrap();
    assert_eq!(corrected.len(), 40); // 60 samples minus 10 trimmed per end
    for v in corrected {
        assert!((v.as_f64().unwrap() - 36.974).abs() < 1e-9);
    }
    assert!(parsed["noise_corrected"]["std_dev_uv"].as_f64().unwrap() < 1e-9);
    assert!(parsed["noise_smoothed"]["std_dev_uv"].as_f64().unwrap() < 1e-9);
    assert!(!parsed["id"].as_str().unwrap().is_empty());
}

#[test]
fn test_run_discovers_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    write_run_logs(dir.path(), 60);

    tmc()
        .arg("run")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--drift-window")
        .arg("10")
        .arg("--quiet")
        .assert()
        .success();
}

#[test]
fn test_run_writes_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_run_logs(dir.path(), 60);
    let out = dir.path().join("result.json");

    tmc()
        .arg("run")
        .arg("--file-list")
        .arg(&list)
        .arg("--drift-window")
        .arg("10")
        .arg("--output")
        .arg(&out)
        .arg("--compact")
        .arg("--quiet")
        .assert()
        .success();

    let content = std::fs::read_to_string(&out).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert!(parsed["noise_smoothed"]["noise_mk"].as_f64().unwrap() < 1e-9);
}

#[test]
fn test_run_respects_time_window() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_run_logs(dir.path(), 120);

    // restrict to the middle of the run: 120 samples at 3 s cadence from
    // t0; the window below keeps roughly the middle 80
    let output = tmc()
        .arg("run")
        .arg("--file-list")
        .arg(&list)
        .arg("--drift-window")
        .arg("10")
        .arg("--trim")
        .arg("5")
        .arg("--tstart")
        .arg(log_stamp(1_457_630_000 + 3 * 20))
        .arg("--tstop")
        .arg(log_stamp(1_457_630_000 + 3 * 100))
        .arg("--quiet")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    // both window bounds are excluded: samples 21..=99 survive, minus trim
    let corrected = parsed["corrected"]["values"].as_array().unwrap();
    assert_eq!(corrected.len(), 79 - 10);
}

#[test]
fn test_run_bad_window_is_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_run_logs(dir.path(), 60);

    tmc()
        .arg("run")
        .arg("--file-list")
        .arg(&list)
        .arg("--tstart")
        .arg("2016/03/10-14:00:00")
        .arg("--tstop")
        .arg("2016/03/10-13:00:00")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_run_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let list = write_run_logs(dir.path(), 60);
    let config = dir.path().join("request.json");
    std::fs::write(&config, r#"{"drift_window": 10, "grid_trim": 5}"#).unwrap();

    let output = tmc()
        .arg("run")
        .arg("--file-list")
        .arg(&list)
        .arg("--config")
        .arg(&config)
        .arg("--quiet")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["request"]["grid_trim"], 5);
    assert_eq!(
        parsed["corrected"]["values"].as_array().unwrap().len(),
        50
    );
}
