//! End-to-end tests for the picketline binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const SNAPSHOT: &str = r#"{
  "version": "v-cli-1",
  "cachedRegion": {
    "center": { "lat": 40.0, "lng": -74.0 },
    "radiusMeters": 80467,
    "refreshThresholdMeters": 128747
  },
  "geofences": {
    "total": 1,
    "all": [
      {
        "id": "store-1",
        "type": "picket-site",
        "actionId": "act-42",
        "employerId": "emp-sbux",
        "employerName": "Starbucks",
        "actionType": "strike",
        "coordinates": { "lat": 40.001, "lng": -74.0 },
        "notificationRadius": 300
      }
    ]
  },
  "blocklist": {
    "totalUrls": 1,
    "totalEmployers": 1,
    "urls": [
      {
        "url": "https://www.starbucks.com/",
        "employer": "Starbucks",
        "employerId": "emp-sbux",
        "actionType": "strike",
        "actionId": "act-42"
      }
    ]
  }
}"#;

fn picketline(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("picketline").unwrap();
    cmd.current_dir(dir)
        .env_remove("PICKETLINE_CONFIG")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_decode_built_query() {
    let dir = tempfile::tempdir().unwrap();
    picketline(dir.path())
        .args(["decode", "--domain", "Store.Starbucks.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("store.starbucks.com"));
}

#[test]
fn test_decode_short_frame() {
    let dir = tempfile::tempdir().unwrap();
    picketline(dir.path())
        .args(["decode", "45000010"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no DNS question"));
}

#[test]
fn test_check_against_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("region.json"), SNAPSHOT).unwrap();

    picketline(dir.path())
        .args(["check", "store.starbucks.com", "example.org", "--snapshot", "region.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starbucks"))
        .stdout(predicate::str::contains("example.org: no active action"));
}

#[test]
fn test_geofence_hit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("region.json"), SNAPSHOT).unwrap();

    picketline(dir.path())
        .args(["geofence", "--lat", "40.0", "--lng", "-74.0", "--snapshot", "region.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 1 geofences"));
}

#[test]
fn test_allow_add_list_remove() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("allowed.txt");
    let file = file.to_str().unwrap();

    picketline(dir.path())
        .args(["allow", "add", "https://www.starbucks.com/", "--file", file])
        .assert()
        .success();
    picketline(dir.path())
        .args(["allow", "list", "--file", file])
        .assert()
        .success()
        .stdout(predicate::str::contains("starbucks.com"));
    picketline(dir.path())
        .args(["allow", "remove", "starbucks.com", "--file", file])
        .assert()
        .success();
    picketline(dir.path())
        .args(["allow", "remove", "starbucks.com", "--file", file])
        .assert()
        .failure();
}

#[test]
fn test_config_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    picketline(dir.path())
        .args(["--config", "nope.toml", "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_run_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("region.json"), SNAPSHOT).unwrap();

    picketline(dir.path())
        .args([
            "run",
            "--dry-run",
            "--snapshot",
            "region.json",
            "--allowlist",
            "allowed.txt",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blocklist: 1 hosts"));
}
