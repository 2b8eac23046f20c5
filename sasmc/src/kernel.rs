//! Form-factor kernel interface.
//!
//! The optimizer treats the scatterer model as opaque: a [`Kernel`] is bound
//! to a model identity and a Q-grid at construction and, given a full
//! parameter mapping, returns the squared form-factor amplitude on that grid
//! together with the scatterer volume.

use super::error::{Error, Result};
use super::sphere::SphereKernel;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Parameter-name to value mapping handed to a kernel evaluation.
pub type Params = BTreeMap<String, f64>;

/// Result of one kernel evaluation.
#[derive(Clone, Debug)]
pub struct KernelEval {
    /// Squared form-factor amplitude on the kernel's Q-grid, volume-weighted
    /// the way the model defines it.
    pub fsq: Array1<f64>,
    /// Volume of the scatterer for the evaluated parameters.
    pub volume: f64,
}

/// A form-factor evaluator bound to a model identity and a Q-grid.
///
/// Implementations must be deterministic and free of side effects; the same
/// parameters always produce the same output.
pub trait Kernel: Send + Sync {
    /// Returns the Q-grid the kernel was constructed with.
    fn q(&self) -> &Array1<f64>;

    /// Names of the parameters the Monte Carlo loop may sample over.
    fn fit_parameters(&self) -> &[&'static str];

    /// Evaluates the model for one full parameter mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KernelFailure`] when a required parameter is missing
    /// or outside the model's domain.
    fn evaluate(&self, params: &Params) -> Result<KernelEval>;
}

/// Instantiates the kernel registered under `name`, bound to `q`.
///
/// # Errors
///
/// Returns [`Error::ConfigInvalid`] for an unknown model name.
pub fn from_name(name: &str, q: Array1<f64>) -> Result<Box<dyn Kernel>> {
    match name {
        "sphere" => Ok(Box::new(SphereKernel::new(q))),
        _ => Err(Error::ConfigInvalid(format!("unknown model '{name}'"))),
    }
}
