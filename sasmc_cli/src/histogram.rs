use super::helpers::{self, ReadConfig};
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use prettytable::{cell, row, Row};
use sasmc::analysis::{self, Aggregate, AveragedOpts};
use sasmc::hist::{HistRange, Modes};
use sasmc::store::ResultStore;
use std::path::PathBuf;
use std::process::ExitCode;

/// Histograms a stored result across repetitions and prints the averages.
#[derive(Parser)]
pub struct Opts {
    /// Path of the result file of a finished run.
    #[arg(long, value_hint = ValueHint::FilePath)]
    result_file: PathBuf,
    /// Path of the measured data file the run was fitted against.
    #[arg(long, value_hint = ValueHint::FilePath)]
    data_file: PathBuf,
    /// YAML file describing how to read the data file.
    #[arg(long, value_hint = ValueHint::FilePath)]
    read_config_file: Option<PathBuf>,
    /// YAML file with the list of histogram ranges.
    #[arg(long, value_hint = ValueHint::FilePath)]
    hist_config_file: PathBuf,
    /// Set the number of fractional digits shown.
    #[arg(default_value_t = 4, long, value_name = "DIGITS")]
    digits: usize,
}

impl Opts {
    fn print_opts(&self, aggregate: &Aggregate) {
        let mut table = helpers::create_table();
        table.set_titles(row![c => "parameter", "valMean", "valStd"]);
        for (key, stat) in AveragedOpts::KEYS.iter().zip(aggregate.opts.as_array()) {
            table.add_row(Row::new(vec![
                cell!(l -> key),
                cell!(r -> format!("{:.*e}", self.digits, stat.mean)),
                cell!(r -> format!("{:.*e}", self.digits, stat.std)),
            ]));
        }
        table.printstd();
    }

    fn print_range(&self, index: usize, aggregate: &Aggregate) {
        let histogram = &aggregate.histograms[index];
        let range = &histogram.range;
        println!(
            "\nrange {index}: {} in [{:e}, {:e}], {:?}-weighted",
            range.parameter, range.range_min, range.range_max, range.weighting
        );

        let mut modes = helpers::create_table();
        modes.set_titles(row![c => "mode", "valMean", "valStd"]);
        for (key, stat) in Modes::KEYS.iter().zip(aggregate.modes[index].as_array()) {
            modes.add_row(Row::new(vec![
                cell!(l -> key),
                cell!(r -> format!("{:.*e}", self.digits, stat.mean)),
                cell!(r -> format!("{:.*e}", self.digits, stat.std)),
            ]));
        }
        modes.printstd();

        let mut bins = helpers::create_table();
        bins.set_titles(row![c => "bin", "xMean", "xWidth", "yMean", "yStd"]);
        for bin in 0..histogram.y_mean.len() {
            bins.add_row(Row::new(vec![
                cell!(r -> bin),
                cell!(r -> format!("{:.*e}", self.digits, histogram.x_mean[bin])),
                cell!(r -> format!("{:.*e}", self.digits, histogram.x_width[bin])),
                cell!(r -> format!("{:.*e}", self.digits, histogram.y_mean[bin])),
                cell!(r -> format!("{:.*e}", self.digits, histogram.y_std[bin])),
            ]));
        }
        bins.printstd();
    }
}

impl Subcommand for Opts {
    fn run(&self, _cfg: &GlobalConfiguration) -> Result<ExitCode> {
        let read_config = match &self.read_config_file {
            Some(path) => helpers::read_yaml(path)?,
            None => ReadConfig::default(),
        };
        let meas = helpers::load_data(&self.data_file, &read_config)?;
        let ranges: Vec<HistRange> = helpers::read_yaml(&self.hist_config_file)?;
        let store = ResultStore::open(&self.result_file).context(format!(
            "unable to read '{}'",
            self.result_file.display()
        ))?;

        let aggregate = analysis::aggregate(&store, &meas, &ranges)?;

        println!(
            "averaged over repetitions {:?}{}",
            aggregate.repetitions,
            if aggregate.failed.is_empty() {
                String::new()
            } else {
                format!(", skipped {:?}", aggregate.failed)
            }
        );
        self.print_opts(&aggregate);
        for index in 0..aggregate.histograms.len() {
            self.print_range(index, &aggregate);
        }

        Ok(ExitCode::SUCCESS)
    }
}
