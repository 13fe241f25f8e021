use std::fs;
use std::path::Path;
use std::process::Command;

use phrase_matcher::audio::wav::write_wav;
use phrase_matcher::testing::signals::{chirp, white_noise};
use serde_json::Value;
use tempfile::{tempdir, TempDir};

const RATE: u32 = 16_000;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_phrase_cli"))
}

fn rising() -> Vec<f32> {
    chirp(200.0, 1200.0, 1.0, RATE, 0.5)
}

fn falling() -> Vec<f32> {
    chirp(1500.0, 300.0, 1.0, RATE, 0.5)
}

/// Template tree with two labels plus a scratch area for query files
fn workspace() -> TempDir {
    let dir = tempdir().unwrap();
    for (label, samples) in [("lights_on", rising()), ("lights_off", falling())] {
        let label_dir = dir.path().join("templates").join(label);
        fs::create_dir_all(&label_dir).unwrap();
        write_wav(&label_dir.join("take1.wav"), &samples, RATE).unwrap();
    }
    dir
}

fn write_query(dir: &Path, name: &str, samples: &[f32]) -> String {
    let path = dir.join(name);
    write_wav(&path, samples, RATE).unwrap();
    path.to_string_lossy().into_owned()
}

fn templates_arg(dir: &Path) -> String {
    dir.join("templates").to_string_lossy().into_owned()
}

#[test]
fn classify_reports_nearest_label() {
    let dir = workspace();
    let query = write_query(dir.path(), "query.wav", &falling());

    let output = cli()
        .args(["classify", "--input", &query, "--templates", &templates_arg(dir.path())])
        .output()
        .expect("failed to run phrase_cli classify");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("classification report JSON");
    assert_eq!(json["label"], "lights_off");
    assert_eq!(json["accepted"], true);
    assert_eq!(json["ranking"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["ranking"][0]["label"], "lights_off");
}

#[test]
fn classify_below_threshold_exits_with_no_match() {
    let dir = workspace();
    let query = write_query(dir.path(), "hiss.wav", &white_noise(1.0, RATE, 0.4, 21));

    let output = cli()
        .args([
            "classify",
            "--input",
            &query,
            "--templates",
            &templates_arg(dir.path()),
            "--threshold",
            "0.0",
        ])
        .output()
        .expect("failed to run thresholded classify");
    assert_eq!(output.status.code(), Some(2));
    let json: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(json["accepted"], false);
}

#[test]
fn missing_templates_is_fatal() {
    let dir = tempdir().unwrap();
    let query = write_query(dir.path(), "query.wav", &rising());
    let output = cli()
        .args([
            "classify",
            "--input",
            &query,
            "--templates",
            &dir.path().join("nowhere").to_string_lossy(),
        ])
        .output()
        .expect("failed to run classify");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loading templates"), "stderr: {stderr}");
}

#[test]
fn enrolled_template_is_used_by_classify() {
    let dir = tempdir().unwrap();
    let templates = dir.path().join("templates");
    let take = write_query(dir.path(), "hello.wav", &rising());

    let enroll = cli()
        .args([
            "enroll",
            "--input",
            &take,
            "--label",
            "hello",
            "--templates",
            &templates.to_string_lossy(),
        ])
        .output()
        .expect("failed to run enroll");
    assert!(enroll.status.success(), "{}", String::from_utf8_lossy(&enroll.stderr));
    let saved = templates.join("hello").join("hello.json");
    assert!(saved.exists());

    let output = cli()
        .args(["classify", "--input", &take, "--templates", &templates.to_string_lossy()])
        .output()
        .expect("failed to run classify");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(json["label"], "hello");
}

#[test]
fn simulate_triggered_emits_one_event_per_segment() {
    let dir = workspace();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{ "capture": { "duration_ms": 1000 } }"#).unwrap();
    let mut audio = rising();
    audio.extend(falling());
    let input = write_query(dir.path(), "session.wav", &audio);

    let output = cli()
        .args([
            "simulate",
            "--input",
            &input,
            "--mode",
            "triggered",
            "--config",
            &config.to_string_lossy(),
            "--templates",
            &templates_arg(dir.path()),
        ])
        .output()
        .expect("failed to run simulate");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let labels: Vec<String> = stdout
        .lines()
        .map(|line| {
            let event: Value = serde_json::from_str(line).expect("event JSON line");
            event["result"]["label"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(labels, vec!["lights_on", "lights_off"]);
}

#[test]
fn simulate_continuous_streams_ordered_events() {
    let dir = workspace();
    let config = dir.path().join("config.json");
    fs::write(
        &config,
        r#"{ "capture": { "window_ms": 1000, "hop_ms": 500 } }"#,
    )
    .unwrap();
    let mut audio = rising();
    audio.extend(falling());
    audio.extend(rising());
    let input = write_query(dir.path(), "stream.wav", &audio);

    let output = cli()
        .args([
            "simulate",
            "--input",
            &input,
            "--mode",
            "continuous",
            "--config",
            &config.to_string_lossy(),
            "--templates",
            &templates_arg(dir.path()),
        ])
        .output()
        .expect("failed to run simulate");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let sequences: Vec<u64> = stdout
        .lines()
        .map(|line| {
            let event: Value = serde_json::from_str(line).expect("event JSON line");
            assert_eq!(event["mode"], "continuous");
            event["sequence"].as_u64().unwrap_or(u64::MAX)
        })
        .collect();
    assert!(sequences.len() >= 3, "got {} events", sequences.len());
    assert_eq!(sequences, (0..sequences.len() as u64).collect::<Vec<_>>());
}

#[test]
fn unknown_mode_is_rejected_by_argument_parser() {
    let output = cli()
        .args(["simulate", "--input", "x.wav", "--mode", "sometimes"])
        .output()
        .expect("failed to run simulate");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sometimes"), "stderr: {stderr}");
}
