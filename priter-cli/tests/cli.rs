//! CLI-surface tests for the two task binaries, in the style of the
//! teacher's `assert_cmd`-based end-to-end tests: exercise the process
//! boundary (argument parsing, exit codes) rather than internal logic,
//! which the library crates already cover.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn reduce_task_help_lists_required_arguments() {
    Command::cargo_bin("priter-reduce-task")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--addr"))
        .stdout(contains("--config"))
        .stdout(contains("--data-dir"))
        .stdout(contains("--task-id"));
}

#[test]
fn reduce_task_without_required_arguments_fails() {
    Command::cargo_bin("priter-reduce-task")
        .unwrap()
        .assert()
        .failure()
        .stderr(contains("required"));
}

#[test]
fn map_task_help_lists_required_arguments() {
    Command::cargo_bin("priter-map-task")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--addr"))
        .stdout(contains("--partition-id"))
        .stdout(contains("--reduce-addr"));
}

#[test]
fn map_task_without_required_arguments_fails() {
    Command::cargo_bin("priter-map-task")
        .unwrap()
        .assert()
        .failure()
        .stderr(contains("required"));
}

#[test]
fn reduce_task_reports_an_unreadable_config_file_instead_of_panicking() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("priter-reduce-task")
        .unwrap()
        .args([
            "--addr",
            "127.0.0.1:0",
            "--config",
            dir.path().join("missing.properties").to_str().unwrap(),
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--task-id",
            "0",
        ])
        .assert()
        .failure();
}
