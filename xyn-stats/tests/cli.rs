//! CLI integration tests for xyn-stats

use assert_cmd::Command;
use libxynae::{Database, Language, PostCategory, PostRecord};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_config(temp_dir: &TempDir, db_path: &Path) -> std::path::PathBuf {
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[database]\nenabled = true\npath = \"{}\"\n",
            db_path.to_string_lossy().replace('\\', "\\\\")
        ),
    )
    .unwrap();
    config_path
}

fn seed(db_path: &Path) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        db.save_post(&PostRecord::new(
            "The network is alive tonight.".to_string(),
            PostCategory::Insight,
            Language::English,
            true,
            Some("1790".to_string()),
        ))
        .await
        .unwrap();
        db.save_post(&PostRecord::new(
            "构建未来。".to_string(),
            PostCategory::Invitation,
            Language::Chinese,
            false,
            None,
        ))
        .await
        .unwrap();
        db.close().await;
    });
}

#[test]
fn test_disabled_store_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[database]\nenabled = false\n").unwrap();

    Command::cargo_bin("xyn-stats")
        .unwrap()
        .env("XYNAE_CONFIG", &config_path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("disabled in configuration"));
}

#[test]
fn test_prints_counts_and_recent_posts() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("activity.db");
    seed(&db_path);
    let config_path = write_config(&temp_dir, &db_path);

    Command::cargo_bin("xyn-stats")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Posts generated:     2 (1 published)"))
        .stdout(predicate::str::contains("[insight/english] The network is alive tonight."))
        .stdout(predicate::str::contains("✗"));
}

#[test]
fn test_json_export() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("activity.db");
    seed(&db_path);
    let config_path = write_config(&temp_dir, &db_path);
    let export_path = temp_dir.path().join("export.json");

    Command::cargo_bin("xyn-stats")
        .unwrap()
        .args(["--config", config_path.to_str().unwrap()])
        .args(["--recent", "1", "--json", export_path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported to"));

    let export: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(export["stats"]["posts_count"], 2);
    assert_eq!(export["recent_posts"].as_array().unwrap().len(), 1);
    assert!(export["recent_replies"].as_array().unwrap().is_empty());
}
