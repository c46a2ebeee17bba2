//! Integration tests for the `slots` CLI binary.
//!
//! These exercise the generate, validate, and expand subcommands through the
//! actual binary, including stdin/stdout piping, file I/O, exception
//! application, and idempotent re-runs against a previous output file.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the template.json fixture.
fn template_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/template.json")
}

/// Helper: path to the overlapping.json fixture.
fn overlapping_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/overlapping.json")
}

/// Helper: path to the exception.json fixture.
fn exception_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/exception.json")
}

/// Helper: read the template.json fixture as a string.
fn template_json() -> String {
    std::fs::read_to_string(template_path()).expect("template.json fixture must exist")
}

// ─────────────────────────────────────────────────────────────────────────────
// Generate subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn generate_stdin_to_stdout() {
    // Monday 2026-03-16 in Toronto (EDT): local 09:00/09:30 → 13:00Z/13:30Z.
    Command::cargo_bin("slots")
        .unwrap()
        .args([
            "generate",
            "--from",
            "2026-03-16",
            "--to",
            "2026-03-16",
            "--now",
            "2026-03-01T00:00:00Z",
        ])
        .write_stdin(template_json())
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-03-16T13:00:00Z"))
        .stdout(predicate::str::contains("2026-03-16T13:30:00Z"));
}

#[test]
fn generate_file_to_file() {
    let output_path = "/tmp/slots-test-generate-output.json";
    let _ = std::fs::remove_file(output_path);

    Command::cargo_bin("slots")
        .unwrap()
        .args([
            "generate",
            "-i",
            template_path(),
            "-o",
            output_path,
            "--from",
            "2026-03-16",
            "--to",
            "2026-03-16",
            "--now",
            "2026-03-01T00:00:00Z",
        ])
        .assert()
        .success();

    let content = std::fs::read_to_string(output_path).expect("output file must exist");
    let slots: serde_json::Value = serde_json::from_str(&content).expect("output must be JSON");
    assert_eq!(slots.as_array().unwrap().len(), 2);
}

#[test]
fn generate_applies_exceptions() {
    // The fixture exception blacks out 13:00-13:30Z, leaving one slot.
    let output = Command::cargo_bin("slots")
        .unwrap()
        .args([
            "generate",
            "-i",
            template_path(),
            "--from",
            "2026-03-16",
            "--to",
            "2026-03-16",
            "--now",
            "2026-03-01T00:00:00Z",
            "--exceptions",
            exception_path(),
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let slots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["start_time"], "2026-03-16T13:30:00Z");
}

#[test]
fn generate_with_blocked_flag_materializes_suppressed_slots() {
    let output = Command::cargo_bin("slots")
        .unwrap()
        .args([
            "generate",
            "-i",
            template_path(),
            "--from",
            "2026-03-16",
            "--to",
            "2026-03-16",
            "--now",
            "2026-03-01T00:00:00Z",
            "--exceptions",
            exception_path(),
            "--blocked",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let slots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["status"], "blocked");
    assert_eq!(slots[1]["status"], "available");
}

#[test]
fn generate_is_idempotent_against_a_previous_run() {
    let output_path = "/tmp/slots-test-idempotent-output.json";
    let _ = std::fs::remove_file(output_path);

    let args = [
        "generate",
        "-i",
        template_path(),
        "--from",
        "2026-03-16",
        "--to",
        "2026-03-16",
        "--now",
        "2026-03-01T00:00:00Z",
    ];

    Command::cargo_bin("slots")
        .unwrap()
        .args(args)
        .arg("-o")
        .arg(output_path)
        .assert()
        .success();

    // Re-run feeding the first run's output back as existing slots.
    let output = Command::cargo_bin("slots")
        .unwrap()
        .args(args)
        .args(["--existing", output_path])
        .output()
        .unwrap();

    assert!(output.status.success());
    let slots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(slots.as_array().unwrap().is_empty());
}

#[test]
fn generate_rejects_malformed_input() {
    Command::cargo_bin("slots")
        .unwrap()
        .args([
            "generate",
            "--from",
            "2026-03-16",
            "--to",
            "2026-03-16",
        ])
        .write_stdin("not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse template JSON"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Validate subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn validate_accepts_a_well_formed_template() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["validate", "-i", template_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("template is valid"));
}

#[test]
fn validate_reports_overlapping_blocks() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["validate", "-i", overlapping_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("overlaps"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Expand subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn expand_prints_occurrence_intervals() {
    // Daily from Mar 16 13:00Z, horizon Mar 20 midnight: Mar 16-19.
    let output = Command::cargo_bin("slots")
        .unwrap()
        .args([
            "expand",
            "-i",
            exception_path(),
            "--horizon",
            "2026-03-20T00:00:00Z",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let occurrences: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let occurrences = occurrences.as_array().unwrap();
    assert_eq!(occurrences.len(), 4);
    assert_eq!(occurrences[0]["start"], "2026-03-16T13:00:00Z");
    assert_eq!(occurrences[3]["start"], "2026-03-19T13:00:00Z");
}

#[test]
fn expand_rejects_a_bad_horizon() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["expand", "-i", exception_path(), "--horizon", "not-a-time"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid RFC 3339 timestamp"));
}
