//! Multi-repetition aggregation.
//!
//! Every stored repetition is reloaded (which re-verifies it against its
//! snapshot), histogrammed, and the histograms, modes and optimization
//! scalars are averaged across repetitions. All averaging is deterministic;
//! running the aggregator twice on the same result file yields identical
//! output.

use super::data::MeasData;
use super::error::{Error, Result};
use super::hist::{self, HistRange, Modes, RangeHistogram};
use super::optimizer::{self, Optimizer};
use super::store::ResultStore;
use ndarray::Array1;
use tracing::{info, warn};

/// Mean and standard deviation of one quantity across repetitions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeanStd {
    /// Mean over the repetitions.
    pub mean: f64,
    /// Sample standard deviation over the repetitions; zero when only one
    /// repetition exists.
    pub std: f64,
}

fn mean_std(samples: &[f64]) -> MeanStd {
    let n = super::convert::f64_from_usize(samples.len());
    let mean = samples.iter().sum::<f64>() / n;
    if samples.len() < 2 {
        return MeanStd { mean, std: 0.0 };
    }
    let ssq = samples
        .iter()
        .map(|&sample| (sample - mean) * (sample - mean))
        .sum::<f64>();
    MeanStd {
        mean,
        std: (ssq / (n - 1.0)).sqrt(),
    }
}

// column-wise mean/std over rows of equal length
fn mean_std_columns(rows: &[Array1<f64>]) -> (Array1<f64>, Array1<f64>) {
    let columns = rows.first().map_or(0, Array1::len);
    let mut mean = Array1::zeros(columns);
    let mut std = Array1::zeros(columns);
    let mut column = Vec::with_capacity(rows.len());
    for k in 0..columns {
        column.clear();
        column.extend(rows.iter().map(|row| row[k]));
        let stats = mean_std(&column);
        mean[k] = stats.mean;
        std[k] = stats.std;
    }
    (mean, std)
}

/// Averaged histogram of one range.
#[derive(Clone, Debug)]
pub struct AveragedHistogram {
    /// The range this histogram was produced for.
    pub range: HistRange,
    /// Shared bin edges of all repetitions.
    pub edges: Array1<f64>,
    /// Bin centers.
    pub x_mean: Array1<f64>,
    /// Bin widths.
    pub x_width: Array1<f64>,
    /// Mean bin height across repetitions.
    pub y_mean: Array1<f64>,
    /// Standard deviation of the bin height across repetitions.
    pub y_std: Array1<f64>,
}

/// Mean and spread of each statistical mode of one range.
#[derive(Clone, Copy, Debug)]
pub struct AveragedModes {
    /// Summed weight.
    pub total_value: MeanStd,
    /// Weighted mean.
    pub mean: MeanStd,
    /// Weighted variance.
    pub variance: MeanStd,
    /// Weighted skewness.
    pub skew: MeanStd,
    /// Weighted kurtosis.
    pub kurtosis: MeanStd,
}

impl AveragedModes {
    /// The averaged modes in [`Modes::KEYS`] order.
    #[must_use]
    pub const fn as_array(&self) -> [MeanStd; 5] {
        [
            self.total_value,
            self.mean,
            self.variance,
            self.skew,
            self.kurtosis,
        ]
    }
}

/// Mean and spread of the optimization scalars.
#[derive(Clone, Copy, Debug)]
pub struct AveragedOpts {
    /// Scaling factor.
    pub scaling: MeanStd,
    /// Flat background.
    pub background: MeanStd,
    /// Goodness of fit.
    pub gof: MeanStd,
    /// Accepted moves.
    pub accepted: MeanStd,
    /// Steps taken.
    pub step: MeanStd,
}

impl AveragedOpts {
    /// Labels of the optimization scalars, in field order.
    pub const KEYS: [&'static str; 5] = ["scaling", "background", "gof", "accepted", "step"];

    /// The averaged scalars, in field order.
    #[must_use]
    pub const fn as_array(&self) -> [MeanStd; 5] {
        [
            self.scaling,
            self.background,
            self.gof,
            self.accepted,
            self.step,
        ]
    }
}

/// Everything the aggregator produces from one result file.
#[derive(Clone, Debug)]
pub struct Aggregate {
    /// Repetition ids that entered the averages, ascending.
    pub repetitions: Vec<usize>,
    /// Repetition ids whose reload failed on a kernel error.
    pub failed: Vec<usize>,
    /// One averaged histogram per requested range.
    pub histograms: Vec<AveragedHistogram>,
    /// One set of averaged modes per requested range.
    pub modes: Vec<AveragedModes>,
    /// Averaged optimization scalars.
    pub opts: AveragedOpts,
    /// Mean of the scaled model intensity `scaling · I + background`.
    pub model_i_mean: Array1<f64>,
    /// Standard deviation of the scaled model intensity.
    pub model_i_std: Array1<f64>,
}

// per-repetition data feeding the averages
struct Loaded {
    id: usize,
    scaled_i: Array1<f64>,
    opt_scalars: [f64; 5],
    histograms: Vec<RangeHistogram>,
}

fn load_repetition(
    store: &ResultStore,
    meas: &MeasData,
    ranges: &[HistRange],
    id: usize,
) -> Result<Loaded> {
    let optimizer = Optimizer::load(meas.clone(), store, id)?;
    let opt = optimizer.opt();
    let histograms = ranges
        .iter()
        .map(|range| hist::histogram(optimizer.ensemble(), range))
        .collect::<Result<Vec<_>>>()?;

    Ok(Loaded {
        id,
        scaled_i: opt.model_i.mapv(|i| opt.x0.scaling.mul_add(i, opt.x0.background)),
        opt_scalars: [
            opt.x0.scaling,
            opt.x0.background,
            opt.gof,
            super::convert::f64_from_u64(opt.accepted),
            super::convert::f64_from_u64(opt.step),
        ],
        histograms,
    })
}

/// Reloads every stored repetition, histograms it against `ranges` and
/// averages histograms, modes and optimization scalars.
///
/// A repetition whose reload fails with a kernel error is recorded in
/// [`Aggregate::failed`] and skipped; any other error aborts.
///
/// # Errors
///
/// Returns [`Error::ConfigInvalid`] when the store holds no usable
/// repetition, [`Error::BinEdgeMismatch`] when repetitions disagree on the
/// edges of a range, and any reload or histogramming error.
pub fn aggregate(
    store: &ResultStore,
    meas: &MeasData,
    ranges: &[HistRange],
) -> Result<Aggregate> {
    let ids = store.repetition_ids(optimizer::MODEL_GROUP);
    info!(repetitions = ids.len(), "aggregating stored repetitions");

    let mut loaded = Vec::new();
    let mut failed = Vec::new();
    for id in ids {
        match load_repetition(store, meas, ranges, id) {
            Ok(repetition) => loaded.push(repetition),
            Err(Error::KernelFailure(reason)) => {
                warn!(repetition = id, reason, "reload failed, skipping repetition");
                failed.push(id);
            }
            Err(err) => return Err(err),
        }
    }
    if loaded.is_empty() {
        return Err(Error::ConfigInvalid(
            "result file holds no usable repetition".to_owned(),
        ));
    }

    let first = &loaded[0];
    for (index, range) in ranges.iter().enumerate() {
        for other in &loaded[1..] {
            if other.histograms[index].edges != first.histograms[index].edges {
                return Err(Error::BinEdgeMismatch {
                    parameter: range.parameter.clone(),
                    first: first.id,
                    second: other.id,
                });
            }
        }
    }

    let mut histograms = Vec::with_capacity(ranges.len());
    let mut modes = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.iter().enumerate() {
        let heights: Vec<Array1<f64>> = loaded
            .iter()
            .map(|repetition| repetition.histograms[index].heights.clone())
            .collect();
        let (y_mean, y_std) = mean_std_columns(&heights);

        let edges = first.histograms[index].edges.clone();
        let x_width: Array1<f64> =
            Array1::from_iter(edges.windows(2).into_iter().map(|w| w[1] - w[0]));
        let x_mean: Array1<f64> = Array1::from_iter(
            edges
                .windows(2)
                .into_iter()
                .map(|w| 0.5_f64.mul_add(w[1] - w[0], w[0])),
        );

        histograms.push(AveragedHistogram {
            range: range.clone(),
            edges,
            x_mean,
            x_width,
            y_mean,
            y_std,
        });

        let per_mode: Vec<MeanStd> = (0..Modes::KEYS.len())
            .map(|mode| {
                let samples: Vec<f64> = loaded
                    .iter()
                    .map(|repetition| repetition.histograms[index].modes.as_array()[mode])
                    .collect();
                mean_std(&samples)
            })
            .collect();
        modes.push(AveragedModes {
            total_value: per_mode[0],
            mean: per_mode[1],
            variance: per_mode[2],
            skew: per_mode[3],
            kurtosis: per_mode[4],
        });
    }

    let per_opt: Vec<MeanStd> = (0..AveragedOpts::KEYS.len())
        .map(|scalar| {
            let samples: Vec<f64> = loaded
                .iter()
                .map(|repetition| repetition.opt_scalars[scalar])
                .collect();
            mean_std(&samples)
        })
        .collect();
    let opts = AveragedOpts {
        scaling: per_opt[0],
        background: per_opt[1],
        gof: per_opt[2],
        accepted: per_opt[3],
        step: per_opt[4],
    };

    let scaled: Vec<Array1<f64>> = loaded
        .iter()
        .map(|repetition| repetition.scaled_i.clone())
        .collect();
    let (model_i_mean, model_i_std) = mean_std_columns(&scaled);

    Ok(Aggregate {
        repetitions: loaded.iter().map(|repetition| repetition.id).collect(),
        failed,
        histograms,
        modes,
        opts,
        model_i_mean,
        model_i_std,
    })
}
