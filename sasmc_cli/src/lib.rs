#![allow(clippy::missing_errors_doc)]
#![allow(missing_docs)]

mod helpers;
mod histogram;
mod run;

use anyhow::Result;
use clap::Parser;
use enum_dispatch::enum_dispatch;
use std::process::ExitCode;

#[derive(Parser)]
pub struct GlobalConfiguration {
    /// Log filter when RUST_LOG is not set, e.g. `info` or `sasmc=debug`.
    #[arg(default_value = "info", long, value_name = "FILTER")]
    pub log: String,
}

#[enum_dispatch]
pub trait Subcommand {
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode>;
}

#[enum_dispatch(Subcommand)]
#[derive(Parser)]
pub enum SubcommandEnum {
    Run(run::Opts),
    Histogram(histogram::Opts),
}

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    author,
    about,
    disable_help_subcommand = true,
    name = "sasmc",
    version
)]
pub struct Opts {
    #[command(flatten)]
    pub configuration: GlobalConfiguration,
    #[command(subcommand)]
    pub subcommand: SubcommandEnum,
}
