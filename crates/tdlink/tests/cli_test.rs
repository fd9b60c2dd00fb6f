//! Integration tests for the `tdlink` CLI binary.
//!
//! Everything here runs without an engine: argument parsing, config
//! handling, error mapping, and (on unix) a round trip through `cat`
//! standing in for the bridge.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tdlink` binary with env isolation.
///
/// Clears all `TDLINK_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn tdlink_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tdlink");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("TDLINK_PROFILE")
        .env_remove("TDLINK_BRIDGE")
        .env_remove("TDLINK_TIMEOUT")
        .env_remove("TDLINK_BOT_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(home: &Path, contents: &str) {
    let dir = home.join(".config").join("tdlink");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const SAMPLE: &str = r#"
default_profile = "main"

[profiles.main]
api_id = 12345
api_hash = "0123456789abcdef"
database_directory = "/tmp/tdlink-main"

[profiles.bot]
api_id = 12345
api_hash_env = "BOT_API_HASH"
bot_token = "123:SECRET"
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = tdlink_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    tdlink_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("login")
            .and(predicate::str::contains("listen"))
            .and(predicate::str::contains("call"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    tdlink_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tdlink"));
}

#[test]
fn test_unknown_subcommand_fails() {
    let home = TempDir::new().unwrap();
    tdlink_cmd(home.path())
        .arg("frobnicate")
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_points_into_config_home() {
    let home = TempDir::new().unwrap();
    tdlink_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("config.toml")
                .and(predicate::str::contains(home.path().to_string_lossy().as_ref())),
        );
}

#[test]
fn test_config_show_without_file_prints_defaults() {
    let home = TempDir::new().unwrap();
    tdlink_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tdjson-bridge"));
}

#[test]
fn test_config_show_redacts_secrets() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), SAMPLE);

    let output = tdlink_cmd(home.path())
        .args(["config", "show"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[profiles.main]"), "{stdout}");
    assert!(stdout.contains("BOT_API_HASH"), "{stdout}");
    assert!(stdout.contains("********"), "{stdout}");
    assert!(!stdout.contains("0123456789abcdef"), "{stdout}");
    assert!(!stdout.contains("SECRET"), "{stdout}");
}

#[test]
fn test_config_show_rejects_unknown_profile() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), SAMPLE);

    let output = tdlink_cmd(home.path())
        .args(["--profile", "nope", "config", "show"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("'nope' not found"), "{text}");
    assert!(text.contains("bot, main"), "{text}");
}

#[test]
fn test_malformed_config_is_reported() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), "default_profile = [unterminated");

    let output = tdlink_cmd(home.path())
        .args(["config", "show"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("config loading failed"));
}

// ── Login / call errors ─────────────────────────────────────────────

#[test]
fn test_login_with_unknown_profile() {
    let home = TempDir::new().unwrap();

    let output = tdlink_cmd(home.path())
        .args(["-p", "ghost", "login"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("'ghost' not found"), "{text}");
    assert!(text.contains("tdlink config init"), "{text}");
}

#[test]
fn test_login_needs_api_hash() {
    let home = TempDir::new().unwrap();
    write_config(home.path(), SAMPLE);

    let output = tdlink_cmd(home.path())
        .env_remove("BOT_API_HASH")
        .args(["-p", "bot", "login"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("no api_hash configured for profile 'bot'"));
}

#[test]
fn test_call_rejects_invalid_json() {
    let home = TempDir::new().unwrap();

    let output = tdlink_cmd(home.path())
        .args(["call", "--no-auth", "{not json"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Invalid value for request"));
}

#[test]
fn test_call_requires_type_field() {
    let home = TempDir::new().unwrap();

    let output = tdlink_cmd(home.path())
        .args(["call", "--no-auth", r#"{"name":"version"}"#])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("@type"));
}

#[test]
fn test_missing_bridge_is_reported() {
    let home = TempDir::new().unwrap();

    let output = tdlink_cmd(home.path())
        .args([
            "--bridge",
            "/nonexistent/tdlink-bridge",
            "call",
            "--no-auth",
            r#"{"@type":"getOption","name":"version"}"#,
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(7));
    let text = combined_output(&output);
    assert!(text.contains("Could not start bridge"), "{text}");
    assert!(text.contains("/nonexistent/tdlink-bridge"), "{text}");
}

// ── Round trip through an echoing bridge ────────────────────────────

/// `cat` echoes each request line back, tag and client id included, so
/// the request comes back as its own reply.
#[cfg(unix)]
#[test]
fn test_call_round_trip_through_echo_bridge() {
    let home = TempDir::new().unwrap();

    let output = tdlink_cmd(home.path())
        .args([
            "--bridge",
            "cat",
            "--output",
            "json-compact",
            "call",
            "--no-auth",
            r#"{"@type":"getOption","name":"version"}"#,
        ])
        .timeout(std::time::Duration::from_secs(30))
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let reply: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(reply["@type"], "getOption");
    assert_eq!(reply["name"], "version");
    // Envelope keys are consumed by routing.
    assert!(reply.get("@extra").is_none());
    assert!(reply.get("@client_id").is_none());
}

#[cfg(unix)]
#[test]
fn test_call_reports_engine_error_payload() {
    let home = TempDir::new().unwrap();

    // An `error` request echoes back as an engine error reply.
    let output = tdlink_cmd(home.path())
        .args([
            "--bridge",
            "cat",
            "call",
            "--no-auth",
            r#"{"@type":"error","code":404,"message":"Not Found"}"#,
        ])
        .timeout(std::time::Duration::from_secs(30))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("Engine error 404: Not Found"));
}
