//! End-to-end tests driving the compiled binary.
//!
//! Restricted to flows that are deterministic on any machine: argument
//! validation and the action protocol boundary. Nothing here invokes the
//! package manager or prompts for privileges.

mod common;

use anyhow::Result;
use common::{TestEnvironment, run_pkb};
use serde_json::Value;
use serial_test::serial;

fn parse_envelope(stdout: &str) -> Value {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON envelope in output: {stdout:?}"));
    serde_json::from_str(line).expect("envelope is valid JSON")
}

#[test]
#[serial]
fn test_unknown_action_returns_invalid_action_envelope() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "frobnicate"])?;

    // Application-level error, protocol-level success.
    assert_eq!(output.exit_code, 0, "stderr: {}", output.stderr);

    let envelope = parse_envelope(&output.stdout);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["code"], "INVALID_ACTION");

    let recognized = envelope["error"]["details"]["recognized"]
        .as_array()
        .expect("recognized action list");
    assert!(recognized.iter().any(|v| v == "install"));
    assert!(recognized.iter().any(|v| v == "update_mirrors"));
    Ok(())
}

#[test]
#[serial]
fn test_empty_install_is_validation_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "install"])?;

    assert_eq!(output.exit_code, 0, "stderr: {}", output.stderr);

    let envelope = parse_envelope(&output.stdout);
    assert_eq!(envelope["status"], "error");
    assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
    Ok(())
}

#[test]
#[serial]
fn test_search_without_query_is_validation_error() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "search"])?;

    assert_eq!(output.exit_code, 0);
    let envelope = parse_envelope(&output.stdout);
    assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        envelope["error"]["details"]["remedy"],
        "correct the input and try again"
    );
    Ok(())
}

#[test]
#[serial]
fn test_clean_cache_rejects_non_numeric_keep() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "clean_cache", "many"])?;

    assert_eq!(output.exit_code, 0);
    let envelope = parse_envelope(&output.stdout);
    assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
    Ok(())
}

#[test]
#[serial]
fn test_info_requires_exactly_one_name() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "info", "vim", "emacs"])?;

    assert_eq!(output.exit_code, 0);
    let envelope = parse_envelope(&output.stdout);
    assert_eq!(envelope["error"]["code"], "VALIDATION_ERROR");
    Ok(())
}

#[test]
#[serial]
fn test_envelope_carries_timestamp_and_request_id() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--json", "action", "frobnicate"])?;

    let envelope = parse_envelope(&output.stdout);
    let timestamp = envelope["timestamp"].as_str().expect("timestamp present");
    assert!(timestamp.contains('T'));

    let request_id = envelope["request_id"].as_str().expect("request id present");
    assert!(request_id.starts_with("req_"));
    Ok(())
}

#[test]
#[serial]
fn test_default_config_file_is_created() -> Result<()> {
    let env = TestEnvironment::new()?;
    run_pkb(&env, &["--json", "action", "frobnicate"])?;

    let written = std::fs::read_to_string(env.config_path())?;
    assert!(written.contains("command_timeout_secs"));
    assert!(written.contains("keepalive_interval_secs"));
    Ok(())
}

#[test]
#[serial]
fn test_help_lists_subcommands() -> Result<()> {
    let env = TestEnvironment::new()?;
    let output = run_pkb(&env, &["--help"])?;

    assert_eq!(output.exit_code, 0);
    for subcommand in ["install", "remove", "search", "font", "action", "menu"] {
        assert!(
            output.stdout.contains(subcommand),
            "--help missing '{subcommand}'"
        );
    }
    Ok(())
}
