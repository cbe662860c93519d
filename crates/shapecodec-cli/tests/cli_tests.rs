//! Integration tests for the `shapecodec` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise the fmt and
//! validate subcommands through the actual binary, including stdin/stdout
//! piping, file I/O, configuration files and error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn shapecodec() -> Command {
    Command::cargo_bin("shapecodec").unwrap()
}

/// A per-process scratch path under the system temp directory.
fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("shapecodec-cli-{}-{name}", std::process::id()))
}

// ─────────────────────────────────────────────────────────────────────────────
// fmt subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn fmt_stdin_to_stdout_compacts_and_sorts() {
    shapecodec()
        .arg("fmt")
        .write_stdin(r#"{ "b": 2, "a": [1, 2] }"#)
        .assert()
        .success()
        .stdout("{\"a\":[1,2],\"b\":2}\n");
}

#[test]
fn fmt_preserves_number_text() {
    shapecodec()
        .args(["fmt", "-i", &fixture("sample.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name":"Alice""#))
        .stdout(predicate::str::contains("[98,87.50,1e3]"))
        .stdout(predicate::str::contains(r#""empty":{},"list""#));
}

#[test]
fn fmt_escapes_html_by_default() {
    shapecodec()
        .args(["fmt", "-i", &fixture("sample.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("u003cb").and(predicate::str::contains("<b>").not()));
}

#[test]
fn fmt_no_escape_html() {
    shapecodec()
        .args(["fmt", "--no-escape-html", "-i", &fixture("sample.json")])
        .assert()
        .success()
        .stdout(predicate::str::contains("<b>&</b>"));
}

#[test]
fn fmt_indented() {
    shapecodec()
        .args(["fmt", "--indent", "  "])
        .write_stdin(r#"[1,{"k":"v"},[]]"#)
        .assert()
        .success()
        .stdout("[\n  1,\n  {\n    \"k\": \"v\"\n  },\n  []\n]\n");
}

#[test]
fn fmt_indented_with_tab_and_prefix() {
    shapecodec()
        .args(["fmt", "--indent", "\\t", "--prefix", "> "])
        .write_stdin(r#"{"a":true}"#)
        .assert()
        .success()
        .stdout("{\n> \t\"a\": true\n> }\n");
}

#[test]
fn fmt_prefix_requires_indent() {
    shapecodec()
        .args(["fmt", "--prefix", "> "])
        .write_stdin("1")
        .assert()
        .failure();
}

#[test]
fn fmt_colorized() {
    shapecodec()
        .args(["fmt", "--color"])
        .write_stdin(r#"{"k":"v","n":1}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("\x1b[1;96m\"k\"\x1b[0m"))
        .stdout(predicate::str::contains("\x1b[1;92m\"v\"\x1b[0m"))
        .stdout(predicate::str::contains("\x1b[1;95m1\x1b[0m"));
}

#[test]
fn fmt_file_to_file() {
    let output = temp_path("fmt-out.json");
    let _ = std::fs::remove_file(&output);

    shapecodec()
        .args(["fmt", "-i", &fixture("sample.json"), "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout("");

    let written = std::fs::read_to_string(&output).expect("output file must exist");
    let original: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("sample.json")).unwrap()).unwrap();
    let reformatted: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(original, reformatted);
    assert!(written.ends_with('\n'));

    let _ = std::fs::remove_file(&output);
}

#[test]
fn fmt_newline_delimited_values() {
    let assert = shapecodec()
        .args(["fmt", "-i", &fixture("events.ndjson")])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], r#"{"at":1700000000,"event":"start"}"#);
    assert_eq!(lines[1], r#"{"at":1700000001,"event":"tick","payload":[1,2,3]}"#);
}

#[test]
fn fmt_duplicate_key_policy() {
    shapecodec()
        .arg("fmt")
        .write_stdin(r#"{"k":1,"k":2}"#)
        .assert()
        .success()
        .stdout("{\"k\":2}\n");

    shapecodec()
        .args(["fmt", "--first-wins"])
        .write_stdin(r#"{"k":1,"k":2}"#)
        .assert()
        .success()
        .stdout("{\"k\":1}\n");
}

#[test]
fn fmt_config_file() {
    shapecodec()
        .args(["fmt", "--config", &fixture("config.json")])
        .write_stdin(r#"{"k":"<","k":"x"}"#)
        .assert()
        .success()
        .stdout("{\n    \"k\": \"<\"\n}\n");
}

#[test]
fn fmt_flags_override_config() {
    shapecodec()
        .args(["fmt", "--config", &fixture("config.json"), "--indent", " "])
        .write_stdin(r#"[1]"#)
        .assert()
        .success()
        .stdout("[\n 1\n]\n");
}

#[test]
fn fmt_invalid_config_fails() {
    let config = temp_path("bad-config.json");
    std::fs::write(&config, r#"{"encode":{"indent":3}}"#).unwrap();

    shapecodec()
        .args(["fmt", "--config"])
        .arg(&config)
        .write_stdin("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));

    let _ = std::fs::remove_file(&config);
}

#[test]
fn fmt_invalid_json_reports_offset() {
    shapecodec()
        .args(["fmt", "-i", &fixture("invalid.json")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to decode value 1"))
        .stderr(predicate::str::contains("offset 7"));
}

#[test]
fn fmt_empty_input_fails() {
    shapecodec()
        .arg("fmt")
        .write_stdin("  \n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No JSON value"));
}

#[test]
fn fmt_stray_closing_bracket_fails() {
    shapecodec()
        .arg("fmt")
        .write_stdin("[1] ]")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected ']' at offset 4"));
}

#[test]
fn fmt_missing_input_file_fails() {
    shapecodec()
        .args(["fmt", "-i", "/nonexistent/input.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// validate subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn validate_accepts_well_formed_file() {
    shapecodec()
        .args(["validate", "-i", &fixture("sample.json")])
        .assert()
        .success()
        .stdout("valid\n");
}

#[test]
fn validate_reports_syntax_offset() {
    shapecodec()
        .args(["validate", "-i", &fixture("invalid.json")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON"))
        .stderr(predicate::str::contains("offset 7"));
}

#[test]
fn validate_rejects_multiple_values_without_stream() {
    shapecodec()
        .args(["validate", "-i", &fixture("events.ndjson")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--stream"));
}

#[test]
fn validate_stream_counts_values() {
    shapecodec()
        .args(["validate", "--stream", "-i", &fixture("events.ndjson")])
        .assert()
        .success()
        .stdout("valid (3 values)\n");
}

#[test]
fn validate_has_no_depth_limit() {
    let deep = format!("{}{}", "[".repeat(5000), "]".repeat(5000));
    shapecodec().arg("validate").write_stdin(deep).assert().success();
}

#[test]
fn validate_truncated_input_fails() {
    shapecodec()
        .arg("validate")
        .write_stdin(r#"{"a":[1,2"#)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn validate_empty_input_fails() {
    shapecodec()
        .arg("validate")
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no value"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Global options
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn debug_logging_goes_to_stderr() {
    shapecodec()
        .args(["--log-level", "debug", "fmt"])
        .write_stdin("[1]")
        .assert()
        .success()
        .stdout("[1]\n")
        .stderr(predicate::str::contains("program cached"));
}

#[test]
fn help_lists_subcommands() {
    shapecodec()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fmt"))
        .stdout(predicate::str::contains("validate"));
}
