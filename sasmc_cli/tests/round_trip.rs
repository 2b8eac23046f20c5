#![allow(missing_docs)]

use assert_cmd::Command;
use assert_fs::fixture::{FileWriteStr, PathChild};
use assert_fs::TempDir;
use predicates::str;
use std::f64::consts::PI;

const RUN_CONFIG: &str = "
nContrib: 15
nRep: 2
modelName: sphere
fitParameterLimits:
  radius:
    low: 5.0
    high: 100.0
    dist: log
maxIter: 2000
maxAccept: 200
convCrit: 1.0e-9
seed: 42
";

const HIST_CONFIG: &str = "
- parameter: radius
  rangeMin: 5.0
  rangeMax: 100.0
  nBins: 20
  binScale: log
  weighting: vol
";

const READ_CONFIG: &str = "
skipRows: 1
qMax: 0.4
";

// analytic sphere curve of radius 30 with a flat background, so the fit has
// a reachable optimum
fn synthetic_data_file() -> String {
    let radius: f64 = 30.0;
    let volume = 4.0 / 3.0 * PI * radius.powi(3);
    let mut lines = vec!["# q i isigma".to_owned()];
    for point in 0..60 {
        let q = 0.005 + 0.008 * f64::from(point);
        let x = q * radius;
        let amplitude = 3.0 * (x.sin() - x * x.cos()) / (x * x * x);
        let intensity = volume * amplitude * amplitude + 0.05;
        lines.push(format!("{q} {intensity} {}", 0.01 * intensity));
    }
    lines.join("\n")
}

#[test]
fn run_then_histogram() {
    let dir = TempDir::new().unwrap();
    dir.child("data.dat")
        .write_str(&synthetic_data_file())
        .unwrap();
    dir.child("run.yaml").write_str(RUN_CONFIG).unwrap();
    dir.child("hist.yaml").write_str(HIST_CONFIG).unwrap();
    dir.child("read.yaml").write_str(READ_CONFIG).unwrap();

    Command::cargo_bin("sasmc")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "run",
            "--data-file",
            "data.dat",
            "--read-config-file",
            "read.yaml",
            "--run-config-file",
            "run.yaml",
            "--result-file",
            "result.mcres",
        ])
        .assert()
        .success();

    assert!(dir.child("result.mcres").path().is_file());

    Command::cargo_bin("sasmc")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "histogram",
            "--data-file",
            "data.dat",
            "--read-config-file",
            "read.yaml",
            "--result-file",
            "result.mcres",
            "--hist-config-file",
            "hist.yaml",
        ])
        .assert()
        .success()
        .stdout(str::contains("averaged over repetitions [0, 1]"))
        .stdout(str::contains("scaling"))
        .stdout(str::contains("totalValue"))
        .stdout(str::contains("yMean"));
}

#[test]
fn rerunning_replaces_the_result_file() {
    let dir = TempDir::new().unwrap();
    dir.child("data.dat")
        .write_str(&synthetic_data_file())
        .unwrap();
    dir.child("run.yaml").write_str(RUN_CONFIG).unwrap();

    for _ in 0..2 {
        Command::cargo_bin("sasmc")
            .unwrap()
            .current_dir(dir.path())
            .args([
                "run",
                "--data-file",
                "data.dat",
                "--run-config-file",
                "run.yaml",
                "--result-file",
                "result.mcres",
            ])
            .assert()
            .success();
    }
}

#[test]
fn unknown_run_option_is_reported() {
    let dir = TempDir::new().unwrap();
    dir.child("data.dat")
        .write_str(&synthetic_data_file())
        .unwrap();
    dir.child("run.yaml")
        .write_str(&format!("{RUN_CONFIG}\nnoSuchOption: 1"))
        .unwrap();

    Command::cargo_bin("sasmc")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "run",
            "--data-file",
            "data.dat",
            "--run-config-file",
            "run.yaml",
            "--result-file",
            "result.mcres",
        ])
        .assert()
        .failure()
        .stderr(str::contains("run.yaml"));
}
