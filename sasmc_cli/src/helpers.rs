use anyhow::{bail, Context, Result};
use ndarray::Array1;
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::Table;
use sasmc::data::MeasData;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Options controlling how the columnar data file is read. This is the small
/// built-in loader; instrument-specific formats are read by external tools.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ReadConfig {
    /// Rows to skip before the data starts (headers).
    #[serde(default)]
    pub skip_rows: usize,
    /// Drop all points below this momentum transfer.
    #[serde(default)]
    pub q_min: Option<f64>,
    /// Drop all points above this momentum transfer.
    #[serde(default)]
    pub q_max: Option<f64>,
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file =
        File::open(path).context(format!("unable to open '{}'", path.display()))?;
    serde_yaml::from_reader(file).context(format!("unable to parse '{}'", path.display()))
}

/// Reads a whitespace- or comma-separated text file with columns Q, I and
/// optionally ISigma. Missing uncertainties default to one percent of the
/// intensity, comment lines start with `#`.
pub fn load_data(path: &Path, config: &ReadConfig) -> Result<MeasData> {
    let file =
        File::open(path).context(format!("unable to open '{}'", path.display()))?;

    let mut q = Vec::new();
    let mut intensity = Vec::new();
    let mut sigma = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context(format!("unable to read '{}'", path.display()))?;
        if index < config.skip_rows {
            continue;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let columns: Vec<f64> = line
            .replace(',', " ")
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .context(format!("malformed number in line {} of '{}'", index + 1, path.display()))?;
        let (qk, ik, sk) = match columns.as_slice() {
            [qk, ik] => (*qk, *ik, 0.01 * ik.abs()),
            [qk, ik, sk, ..] => (*qk, *ik, *sk),
            _ => bail!(
                "line {} of '{}' has fewer than two columns",
                index + 1,
                path.display()
            ),
        };
        if config.q_min.map_or(true, |limit| qk >= limit)
            && config.q_max.map_or(true, |limit| qk <= limit)
        {
            q.push(qk);
            intensity.push(ik);
            sigma.push(sk);
        }
    }

    Ok(MeasData::new(
        Array1::from(q),
        Array1::from(intensity),
        Array1::from(sigma),
    )?)
}

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}
