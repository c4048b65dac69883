//! CLI integration tests for xyn-run

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const PROVIDER_KEYS: [&str; 5] = [
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GOOGLE_API_KEY",
    "GEMINI_API_KEY",
    "X_ACCESS_TOKEN",
];

/// A command isolated from the caller's keys, config and `.env`
fn isolated(temp_dir: &TempDir) -> Command {
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[database]\nenabled = false\n").unwrap();

    let mut cmd = Command::cargo_bin("xyn-run").unwrap();
    cmd.current_dir(temp_dir.path())
        .env("XYNAE_CONFIG", &config_path)
        .env_remove("RUST_LOG");
    for key in PROVIDER_KEYS {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("xyn-run").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--post-interval"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_no_provider_exits_with_config_code() {
    let temp_dir = TempDir::new().unwrap();

    isolated(&temp_dir)
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No LLM providers configured"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let temp_dir = TempDir::new().unwrap();

    isolated(&temp_dir)
        .args(["--config", "does-not-exist.toml", "--once"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_invalid_interval_rejected() {
    let temp_dir = TempDir::new().unwrap();

    isolated(&temp_dir)
        .args(["--post-interval", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--post-interval"));
}

#[test]
fn test_dotenv_log_settings_apply() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(".env"),
        "XYNAE_LOG_FORMAT=json\nXYNAE_LOG_LEVEL=warn\n",
    )
    .unwrap();

    isolated(&temp_dir)
        .env_remove("XYNAE_LOG_FORMAT")
        .env_remove("XYNAE_LOG_LEVEL")
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(r#""level":"WARN""#))
        .stderr(predicate::str::contains(r#""message":"Skipping LLM provider"#));
}
