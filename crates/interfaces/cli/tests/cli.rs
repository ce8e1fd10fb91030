use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

fn config_pointing_at(dir: &std::path::Path) -> std::path::PathBuf {
    let config_path = dir.join("kestrel.toml");
    let store_path = dir.join("alarms.json");
    fs::write(
        &config_path,
        format!(
            "[alarm]\nstore_path = {:?}\ntimezone = \"UTC\"\n",
            store_path.display().to_string()
        ),
    )
    .expect("write config");
    config_path
}

#[test]
fn set_relative_then_list_shows_the_alarm() {
    let dir = tempdir().expect("tempdir");
    let config = config_pointing_at(dir.path());

    let mut set_cmd = cargo_bin_cmd!("kestrel-sim");
    set_cmd
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("set-relative")
        .arg("wake-up")
        .arg("120")
        .assert()
        .success();

    let mut list_cmd = cargo_bin_cmd!("kestrel-sim");
    list_cmd
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("wake-up"));
}

#[test]
fn cancel_removes_alarm_from_listing() {
    let dir = tempdir().expect("tempdir");
    let config = config_pointing_at(dir.path());

    cargo_bin_cmd!("kestrel-sim")
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("set-relative")
        .arg("errand")
        .arg("60")
        .assert()
        .success();

    cargo_bin_cmd!("kestrel-sim")
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("cancel")
        .arg("errand")
        .assert()
        .success();

    cargo_bin_cmd!("kestrel-sim")
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("errand").not());
}

#[test]
fn cancel_unknown_alarm_fails() {
    let dir = tempdir().expect("tempdir");
    let config = config_pointing_at(dir.path());

    cargo_bin_cmd!("kestrel-sim")
        .arg("--config")
        .arg(&config)
        .arg("alarm")
        .arg("cancel")
        .arg("nope")
        .assert()
        .failure();
}
