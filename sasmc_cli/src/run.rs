use super::helpers::{self, ReadConfig};
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use sasmc::config::RunConfig;
use sasmc::runner;
use sasmc::store::ResultStore;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

/// Runs a Monte Carlo fit and stores its repetitions in a result file.
#[derive(Parser)]
pub struct Opts {
    /// Path of the measured data file (columns Q, I, ISigma).
    #[arg(long, value_hint = ValueHint::FilePath)]
    data_file: PathBuf,
    /// YAML file describing how to read the data file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    read_config_file: Option<PathBuf>,
    /// YAML file with the run configuration.
    #[arg(long, value_hint = ValueHint::FilePath)]
    run_config_file: PathBuf,
    /// Path of the result file to create. An existing file is replaced.
    #[arg(long, value_hint = ValueHint::FilePath)]
    result_file: PathBuf,
}

impl Subcommand for Opts {
    fn run(&self, _cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let read_config = match &self.read_config_file {
            Some(path) => helpers::read_yaml(path)?,
            None => ReadConfig::default(),
        };
        let meas = helpers::load_data(&self.data_file, &read_config)?;
        let run_config: RunConfig = helpers::read_yaml(&self.run_config_file)?;

        if self.result_file.is_file() {
            std::fs::remove_file(&self.result_file).context(format!(
                "unable to replace '{}'",
                self.result_file.display()
            ))?;
        }

        let mut store = ResultStore::new();
        let cancel = AtomicBool::new(false);
        runner::run(&meas, &run_config, &mut store, &cancel)?;
        store.save(&self.result_file).context(format!(
            "unable to write '{}'",
            self.result_file.display()
        ))?;

        Ok(ExitCode::SUCCESS)
    }
}
