use std::{
    env,
    fs,
    path::PathBuf,
    process::Command,
};

const VALID_CHART: &str = r#"{
  "meta": {"title": "T", "artist": "A", "version": "Normal"},
  "columns": 2,
  "overall_difficulty": 0,
  "notes": [
    {"time_ms": 0, "col": 0, "type": "tap"},
    {"time_ms": 0, "col": 1, "type": "tap"},
    {"time_ms": 100, "col": 0, "type": "tap"},
    {"time_ms": 300, "col": 1, "type": "hold", "end_time_ms": 700, "tick_times_ms": [500]}
  ]
}"#;

const OVERLAPPING_CHART: &str = r#"{
  "meta": {"title": "T", "artist": "A", "version": "Broken"},
  "columns": 1,
  "notes": [
    {"time_ms": 0, "col": 0, "type": "hold", "end_time_ms": 200},
    {"time_ms": 100, "col": 0, "type": "tap"}
  ]
}"#;

fn norm_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("psim_cli_{name}_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn help_mentions_subcommands() {
    let exe = env!("CARGO_BIN_EXE_psim");

    let output = Command::new(exe).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = norm_newlines(&String::from_utf8_lossy(&output.stdout));

    // Only check presence; clap wording may change.
    assert!(stdout.contains("curve"));
    assert!(stdout.contains("actions"));
    assert!(stdout.contains("timeline"));
    assert!(stdout.contains("check"));
}

#[test]
fn check_reports_event_counts() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("check_ok");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let output = Command::new(exe)
        .args(["check", input.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = norm_newlines(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("ok: A - T [Normal]"));
    assert!(stdout.contains("notes=4 events=6 channels=2"));
    assert!(stdout.contains("channel 1: 4 events"));
}

#[test]
fn invalid_chart_error_output_format_is_stable() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("check_overlap");
    let input = dir.join("chart.json");
    fs::write(&input, OVERLAPPING_CHART).unwrap();

    let output = Command::new(exe)
        .args(["check", input.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));

    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("Error: invalid chart: "));
    assert!(stderr.contains("Caused by:"));
    assert!(stderr.contains("E1006: notes overlap in channel 0"));
}

#[test]
fn missing_input_file_is_reported() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let missing = env::temp_dir().join(format!("psim_cli_missing_{}.json", std::process::id()));
    let _ = fs::remove_file(&missing);

    let output = Command::new(exe)
        .args(["curve", missing.to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&output.stderr));
    assert!(stderr.contains("Error: failed to read chart: "));
}

#[test]
fn curve_writes_output_json() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("curve_ok");
    let input = dir.join("chart.json");
    let output_path = dir.join("curve.json");
    fs::write(&input, VALID_CHART).unwrap();

    let out = Command::new(exe)
        .args([
            "curve",
            input.to_str().unwrap(),
            "--max-level",
            "5",
            "--step",
            "0.5",
            "-o",
            output_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(out.status.success());
    let json = fs::read_to_string(&output_path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["meta"]["title"], "T");
    assert_eq!(v["samples"].as_array().unwrap().len(), 10);
    assert_eq!(v["samples"][0]["skill_level"], 0.0);
    assert!(v["annotations"]["miss_levels"].is_array());
}

#[test]
fn parallel_curve_matches_sequential() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("curve_parallel");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let run = |extra: &[&str]| {
        let out = Command::new(exe)
            .arg("curve")
            .arg(&input)
            .args(extra)
            .output()
            .unwrap();
        assert!(out.status.success());
        String::from_utf8_lossy(&out.stdout).into_owned()
    };

    assert_eq!(run(&[]), run(&["--parallel"]));
}

#[test]
fn config_file_sets_sweep() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("curve_config");
    let input = dir.join("chart.json");
    let config = dir.join("config.json");
    fs::write(&input, VALID_CHART).unwrap();
    fs::write(&config, r#"{"sweep": {"max_level": 2, "step": 1}}"#).unwrap();

    let out = Command::new(exe)
        .args([
            "curve",
            input.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["sweep"]["step"], 1.0);
    assert_eq!(v["samples"].as_array().unwrap().len(), 2);
}

#[test]
fn oversized_sweep_is_rejected() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("curve_oversized");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let out = Command::new(exe)
        .args(["curve", input.to_str().unwrap(), "--step", "1e-9"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&out.stderr));
    assert!(stderr.contains("Error: simulation failed: "));
    assert!(stderr.contains("E1102"));
}

#[test]
fn actions_batch_simultaneous_presses() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("actions_ok");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let out = Command::new(exe)
        .args(["actions", input.to_str().unwrap(), "--level", "10"])
        .output()
        .unwrap();

    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["skill_level"], 10.0);

    let first = &v["frames"][0];
    assert_eq!(first["time_ms"], -16.0);
    assert_eq!(first["actions"].as_array().unwrap().len(), 2);
    assert_eq!(first["actions"][0]["type"], "press");
    assert_eq!(first["held"], serde_json::json!([0, 1]));
}

#[test]
fn negative_level_is_rejected() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("actions_negative");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let out = Command::new(exe)
        .args(["actions", input.to_str().unwrap(), "--level=-1"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = norm_newlines(&String::from_utf8_lossy(&out.stderr));
    assert!(stderr.contains("Error: simulation failed: "));
    assert!(stderr.contains("E1101"));
}

#[test]
fn timeline_prints_lane_table() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("timeline_ok");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    let out = Command::new(exe)
        .args(["timeline", input.to_str().unwrap(), "--level", "1"])
        .output()
        .unwrap();

    assert!(out.status.success());
    let stdout = norm_newlines(&String::from_utf8_lossy(&out.stdout));
    assert!(stdout.contains("Time(ms)  | 0 1 | Info"));
    assert!(stdout.contains("ch0 miss"));
    assert!(stdout.lines().any(|l| l.contains("| P P |")));
}

#[test]
fn output_write_failure_is_reported_stably() {
    let exe = env!("CARGO_BIN_EXE_psim");
    let dir = scratch_dir("write_failure");
    let input = dir.join("chart.json");
    fs::write(&input, VALID_CHART).unwrap();

    // Parent directory does not exist; only the prefix is checked since the
    // I/O error text is OS dependent.
    let missing_parent = dir.join(format!("missing_dir_{}", std::process::id()));
    let _ = fs::remove_dir_all(&missing_parent);
    let output_path = missing_parent.join("curve.json");

    let out = Command::new(exe)
        .args([
            "curve",
            input.to_str().unwrap(),
            "-o",
            output_path.to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(1));

    let stderr = norm_newlines(&String::from_utf8_lossy(&out.stderr));
    assert!(stderr.contains("Error: failed to write:"));
    assert!(stderr.contains("curve.json"));
    assert!(stderr.contains("Caused by:"));
}
