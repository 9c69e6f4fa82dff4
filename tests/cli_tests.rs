//! Start-up and end-to-end tests for the catalogresolver binary.
//!
//! assert_cmd pipes stdin, so the binary always sees a non-interactive
//! terminal: missing configuration must fail fast instead of prompting.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use common::fixtures::{load_json_fixture, test_config_toml};
use common::wiremock_helpers::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn catalogresolver() -> assert_cmd::Command {
    cargo_bin_cmd!("catalogresolver")
}

fn write_config(dir: &Path, endpoint: &str, checkpoint_interval: usize) {
    let config_dir = dir.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("catalogresolver.toml"),
        test_config_toml(endpoint, checkpoint_interval),
    )
    .unwrap();
}

#[test]
fn test_missing_config_exits_fast_not_hangs() {
    let tmp = TempDir::new().expect("create temp dir");

    catalogresolver()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found").and(predicate::str::contains("--init")));
}

#[test]
fn test_init_creates_config_file() {
    let tmp = TempDir::new().expect("create temp dir");
    let config_path = tmp.path().join("config").join("catalogresolver.toml");

    catalogresolver()
        .current_dir(tmp.path())
        .arg("--init")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[search]"), "config should have [search] section");
    assert!(content.contains("[rate_limit]"), "config should have [rate_limit] section");
    assert!(content.contains("checkpoint_interval = 50"));
}

#[test]
fn test_init_honors_config_path() {
    let tmp = TempDir::new().expect("create temp dir");

    catalogresolver()
        .current_dir(tmp.path())
        .args(["--init", "--config", "custom/resolver.toml"])
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    assert!(tmp.path().join("custom").join("resolver.toml").exists());
}

#[test]
fn test_help_works_without_config() {
    let tmp = TempDir::new().expect("create temp dir");

    catalogresolver()
        .current_dir(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--resume").and(predicate::str::contains("--checkpoint-interval")));
}

#[test]
fn test_resume_flags_conflict() {
    catalogresolver()
        .args(["--resume", "--no-resume"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().expect("create temp dir");
    write_config(tmp.path(), "ftp://store.example/api/", 50);

    catalogresolver()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_input_fails() {
    let tmp = TempDir::new().expect("create temp dir");
    write_config(tmp.path(), "http://127.0.0.1:1/api/storesearch/", 50);

    catalogresolver()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_run_writes_reports_and_checkpoint() {
    let server = mock_store_server().await;
    mount_search(&server, "half life 2", load_json_fixture("store_search/half_life_2.json")).await;
    mount_search(&server, "portal", load_json_fixture("store_search/portal.json")).await;
    mount_status(&server, "brokengame", 500).await;

    let tmp = TempDir::new().expect("create temp dir");
    write_config(tmp.path(), &search_endpoint(&server), 50);
    fs::write(
        tmp.path().join("GameList.txt"),
        "Half Life 2 Deluxe Edition\nPortal\n\nBrokenGame\nzzz\nportal\n",
    )
    .unwrap();

    let dir = tmp.path().to_path_buf();
    let stdout = tokio::task::spawn_blocking(move || {
        let assert = catalogresolver()
            .current_dir(&dir)
            .arg("--no-resume")
            .timeout(Duration::from_secs(30))
            .assert()
            .success();
        String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
    })
    .await
    .unwrap();

    assert!(stdout.contains("Half-Life 2 (220) - 9.99 (Original appname: half life 2 deluxe edition)"));
    assert!(stdout.contains("Successful results: 2 (Multiple: 1) / Errors: 1 / Not found: 2 (Found truncated: 1)"));

    let results_dir = tmp.path().join("results");
    let results = fs::read_to_string(results_dir.join("results.txt")).unwrap();
    assert_eq!(results.lines().count(), 2);
    assert!(results_dir.join("not_found.txt").exists());
    assert!(results_dir.join("multiple.json").exists());
    assert!(results_dir.join("errors.txt").exists());

    let checkpoint: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(results_dir.join("checkpoint.json")).unwrap()).unwrap();
    assert_eq!(checkpoint["completed_queries"].as_array().unwrap().len(), 4);
    assert_eq!(checkpoint["region"], "ua");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rerun_resumes_without_new_requests() {
    let server = mock_store_server().await;
    mount_search(&server, "portal", load_json_fixture("store_search/portal.json")).await;

    let tmp = TempDir::new().expect("create temp dir");
    write_config(tmp.path(), &search_endpoint(&server), 50);
    fs::write(tmp.path().join("GameList.txt"), "Portal\n").unwrap();

    for _ in 0..2 {
        let dir = tmp.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            catalogresolver()
                .current_dir(&dir)
                .arg("--resume")
                .timeout(Duration::from_secs(30))
                .assert()
                .success();
        })
        .await
        .unwrap();
    }

    // The second run restores "portal" from the checkpoint
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);

    let results = fs::read_to_string(tmp.path().join("results").join("results.txt")).unwrap();
    assert_eq!(results, "Portal (400) - 4.99 (Original appname: portal)\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_checkpointing_searches_every_run() {
    let server = mock_store_server().await;
    mount_search(&server, "portal", load_json_fixture("store_search/portal.json")).await;

    let tmp = TempDir::new().expect("create temp dir");
    write_config(tmp.path(), &search_endpoint(&server), 0);
    fs::write(tmp.path().join("GameList.txt"), "Portal\n").unwrap();

    for _ in 0..2 {
        let dir = tmp.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            catalogresolver()
                .current_dir(&dir)
                .timeout(Duration::from_secs(30))
                .assert()
                .success();
        })
        .await
        .unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(!tmp.path().join("results").join("checkpoint.json").exists());
    assert!(tmp.path().join("results").join("results.txt").exists());
}
