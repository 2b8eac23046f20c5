//! Projection of a completed ensemble onto user-defined histogram ranges.
//!
//! Bin edges are a function of the range specification alone, never of the
//! data, so every repetition of a run bins into identical edges and the
//! aggregator can average heights bin by bin.

use super::error::{Error, Result};
use super::model::Ensemble;
use itertools::izip;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Spacing of the bin edges across a range.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinScale {
    /// Equidistant edges.
    #[default]
    Lin,
    /// Edges equidistant in log space.
    Log,
}

/// Weight a contribution carries in histogram and modes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Volume-weighted.
    #[default]
    Vol,
    /// Number-weighted.
    Num,
    /// Weighted by the squared volume.
    #[serde(rename = "volsq")]
    VolSq,
}

/// One user-defined histogram range over a fit parameter.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct HistRange {
    /// Fit parameter the range projects onto.
    pub parameter: String,
    /// Lower end of the range.
    pub range_min: f64,
    /// Upper end of the range.
    pub range_max: f64,
    /// Number of bins.
    pub n_bins: usize,
    /// Spacing of the bin edges.
    #[serde(default)]
    pub bin_scale: BinScale,
    /// Weight carried by each contribution.
    #[serde(default)]
    pub weighting: Weighting,
}

impl HistRange {
    /// Checks the range specification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] for an empty bin count, a
    /// non-ascending or non-finite range, or a log range reaching zero.
    pub fn validate(&self) -> Result<()> {
        if self.n_bins == 0 {
            return Err(Error::ConfigInvalid(format!(
                "histogram range for '{}' needs at least one bin",
                self.parameter
            )));
        }
        if !(self.range_min.is_finite() && self.range_max.is_finite())
            || self.range_min >= self.range_max
        {
            return Err(Error::ConfigInvalid(format!(
                "histogram range [{}, {}] for '{}' is not ascending",
                self.range_min, self.range_max, self.parameter
            )));
        }
        if self.bin_scale == BinScale::Log && self.range_min <= 0.0 {
            return Err(Error::ConfigInvalid(format!(
                "log-spaced histogram range for '{}' needs a positive lower end",
                self.parameter
            )));
        }
        Ok(())
    }

    /// The `n_bins + 1` bin edges of this range.
    #[must_use]
    pub fn edges(&self) -> Array1<f64> {
        match self.bin_scale {
            BinScale::Lin => Array1::linspace(self.range_min, self.range_max, self.n_bins + 1),
            BinScale::Log => {
                Array1::linspace(self.range_min.log10(), self.range_max.log10(), self.n_bins + 1)
                    .mapv(|edge| 10.0_f64.powf(edge))
            }
        }
    }

    // both range ends are inclusive; interior bin boundaries belong to the
    // bin on their right
    fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.range_min || value > self.range_max {
            return None;
        }
        let position = match self.bin_scale {
            BinScale::Lin => {
                (value - self.range_min) / (self.range_max - self.range_min)
            }
            BinScale::Log => {
                (value.log10() - self.range_min.log10())
                    / (self.range_max.log10() - self.range_min.log10())
            }
        };
        let raw = (position * super::convert::f64_from_usize(self.n_bins)).floor();
        Some(super::convert::usize_from_u64(raw as u64).min(self.n_bins - 1))
    }
}

/// The five statistical modes of a weighted in-range sample.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Modes {
    /// Sum of the weights.
    pub total_value: f64,
    /// Weighted mean.
    pub mean: f64,
    /// Weighted variance.
    pub variance: f64,
    /// Weighted skewness.
    pub skew: f64,
    /// Weighted kurtosis (raw, not excess).
    pub kurtosis: f64,
}

impl Modes {
    /// Labels of the modes, in field order.
    pub const KEYS: [&'static str; 5] = ["totalValue", "mean", "variance", "skew", "kurtosis"];

    /// The mode values, in field order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 5] {
        [
            self.total_value,
            self.mean,
            self.variance,
            self.skew,
            self.kurtosis,
        ]
    }

    fn from_weighted(values: &[f64], weights: &[f64]) -> Self {
        let total_value: f64 = weights.iter().sum();
        if total_value <= 0.0 {
            return Self {
                total_value: 0.0,
                mean: f64::NAN,
                variance: f64::NAN,
                skew: f64::NAN,
                kurtosis: f64::NAN,
            };
        }

        let moment = |center: f64, power: i32| -> f64 {
            izip!(values, weights)
                .map(|(&v, &w)| w * (v - center).powi(power))
                .sum::<f64>()
                / total_value
        };
        let mean = moment(0.0, 1);
        let variance = moment(mean, 2);
        let skew = moment(mean, 3) / variance.powf(1.5);
        let kurtosis = moment(mean, 4) / (variance * variance);

        Self {
            total_value,
            mean,
            variance,
            skew,
            kurtosis,
        }
    }
}

/// Histogram of one range over one repetition's ensemble.
#[derive(Clone, Debug)]
pub struct RangeHistogram {
    /// Bin edges, `n_bins + 1` values.
    pub edges: Array1<f64>,
    /// Summed weights per bin. Not normalized; absolute scaling is applied by
    /// the aggregator.
    pub heights: Array1<f64>,
    /// Modes over the in-range weighted sample.
    pub modes: Modes,
}

/// Projects a completed ensemble onto one histogram range.
///
/// Contributions whose parameter value falls outside the range are excluded
/// from both the histogram and the modes.
///
/// # Errors
///
/// Returns [`Error::ConfigInvalid`] for a malformed range or an unknown
/// parameter name.
pub fn histogram(ensemble: &Ensemble, range: &HistRange) -> Result<RangeHistogram> {
    range.validate()?;
    let values = ensemble.values(&range.parameter)?;
    let volumes = ensemble.volumes();

    let mut heights = Array1::zeros(range.n_bins);
    let mut in_values = Vec::new();
    let mut in_weights = Vec::new();
    for (&value, &volume) in izip!(&values, volumes) {
        let weight = match range.weighting {
            Weighting::Vol => volume,
            Weighting::Num => 1.0,
            Weighting::VolSq => volume * volume,
        };
        if let Some(bin) = range.bin_index(value) {
            heights[bin] += weight;
            in_values.push(value);
            in_weights.push(weight);
        }
    }

    Ok(RangeHistogram {
        edges: range.edges(),
        heights,
        modes: Modes::from_weighted(&in_values, &in_weights),
    })
}
