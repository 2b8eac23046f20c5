#![allow(missing_docs)]

use assert_cmd::Command;
use predicates::str;

#[test]
fn help() {
    Command::cargo_bin("sasmc")
        .unwrap()
        .args(["--help"])
        .assert()
        .success()
        .stdout(str::contains("Usage: sasmc"))
        .stdout(str::contains("run"))
        .stdout(str::contains("histogram"));
}

#[test]
fn no_arguments_prints_help_and_fails() {
    Command::cargo_bin("sasmc")
        .unwrap()
        .assert()
        .failure()
        .stderr(str::contains("Usage: sasmc"));
}

#[test]
fn run_help() {
    Command::cargo_bin("sasmc")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(str::contains("--data-file"))
        .stdout(str::contains("--run-config-file"))
        .stdout(str::contains("--result-file"));
}

#[test]
fn histogram_help() {
    Command::cargo_bin("sasmc")
        .unwrap()
        .args(["histogram", "--help"])
        .assert()
        .success()
        .stdout(str::contains("--result-file"))
        .stdout(str::contains("--hist-config-file"));
}

#[test]
fn run_fails_on_a_missing_data_file() {
    Command::cargo_bin("sasmc")
        .unwrap()
        .args([
            "run",
            "--data-file",
            "does-not-exist.dat",
            "--run-config-file",
            "does-not-exist.yaml",
            "--result-file",
            "unused.mcres",
        ])
        .assert()
        .failure()
        .stderr(str::contains("does-not-exist.dat"));
}
