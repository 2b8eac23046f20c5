//! Run configuration.

use super::error::{Error, Result};
use super::kernel::Params;
use super::model::ParamPrior;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const fn default_fit_ndof() -> usize {
    2
}

/// Complete configuration of one Monte Carlo run.
///
/// Deserializes from the YAML run-configuration file; field names follow the
/// camel-case convention of that file format.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RunConfig {
    /// Number of contributions per repetition.
    pub n_contrib: usize,
    /// Number of independent repetitions.
    pub n_rep: usize,
    /// Name of the form-factor kernel to fit with.
    pub model_name: String,
    /// Kernel parameters held fixed for the whole run.
    #[serde(default)]
    pub static_parameters: Params,
    /// Sampling prior per fit parameter.
    pub fit_parameter_limits: BTreeMap<String, ParamPrior>,
    /// Step budget per repetition.
    pub max_iter: u64,
    /// Accepted-move budget per repetition.
    pub max_accept: u64,
    /// Goodness-of-fit target ending a repetition early.
    pub conv_crit: f64,
    /// Base RNG seed; drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Degrees of freedom consumed by the scaling/background fit.
    #[serde(default = "default_fit_ndof", rename = "fitNDoF")]
    pub fit_ndof: usize,
    /// Worker threads for the repetitions; the rayon default when absent.
    #[serde(default)]
    pub n_threads: Option<usize>,
}

impl RunConfig {
    /// Checks every option against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] naming the offending option.
    pub fn validate(&self) -> Result<()> {
        if self.n_contrib == 0 {
            return Err(Error::ConfigInvalid("nContrib must be at least 1".to_owned()));
        }
        if self.n_rep == 0 {
            return Err(Error::ConfigInvalid("nRep must be at least 1".to_owned()));
        }
        if self.max_iter == 0 {
            return Err(Error::ConfigInvalid("maxIter must be at least 1".to_owned()));
        }
        if !self.conv_crit.is_finite() || self.conv_crit <= 0.0 {
            return Err(Error::ConfigInvalid(format!(
                "convCrit must be positive, got {}",
                self.conv_crit
            )));
        }
        if self.fit_ndof == 0 {
            return Err(Error::ConfigInvalid("fitNDoF must be at least 1".to_owned()));
        }
        if self.model_name.is_empty() {
            return Err(Error::ConfigInvalid("modelName must not be empty".to_owned()));
        }
        if self.fit_parameter_limits.is_empty() {
            return Err(Error::ConfigInvalid(
                "fitParameterLimits must name at least one parameter".to_owned(),
            ));
        }
        for (name, prior) in &self.fit_parameter_limits {
            prior.validate(name)?;
            if self.static_parameters.contains_key(name) {
                return Err(Error::ConfigInvalid(format!(
                    "'{name}' is both a fit and a static parameter"
                )));
            }
        }
        Ok(())
    }
}
