//! Per-repetition optimization state.

use super::error::Result;
use super::osb::X0;
use super::store::ResultStore;
use ndarray::Array1;

/// Mutable state of one Monte Carlo repetition.
///
/// Holds the running model intensity and its linear alignment, the trial
/// scratch of the step under evaluation, the step/accept counters and the
/// termination targets.
#[derive(Clone, Debug)]
pub struct OptState {
    /// Current total model intensity on the Q-grid.
    pub model_i: Array1<f64>,
    /// Current best scaling and background.
    pub x0: X0,
    /// Goodness of fit of `model_i` under `x0`.
    pub gof: f64,
    /// Trial intensity of the step under evaluation.
    pub test_model_i: Array1<f64>,
    /// Trial scaling and background.
    pub test_x0: X0,
    /// Volume of the candidate contribution.
    pub test_volume: f64,
    /// Steps taken so far.
    pub step: u64,
    /// Accepted moves so far.
    pub accepted: u64,
    /// Step budget.
    pub max_iter: u64,
    /// Accepted-move budget.
    pub max_accept: u64,
    /// Goodness-of-fit target ending the repetition.
    pub conv_crit: f64,
    /// Degrees of freedom consumed by the scaling/background fit.
    pub fit_ndof: usize,
    /// Identifier of this repetition.
    pub repetition: usize,
    /// RNG seed this repetition was started from.
    pub seed: u64,
}

impl OptState {
    /// Fresh state for one repetition; intensities are filled in by the
    /// optimizer's initialization.
    #[must_use]
    pub fn new(
        max_iter: u64,
        max_accept: u64,
        conv_crit: f64,
        fit_ndof: usize,
        repetition: usize,
        seed: u64,
    ) -> Self {
        Self {
            model_i: Array1::zeros(0),
            x0: X0::initial(),
            gof: f64::INFINITY,
            test_model_i: Array1::zeros(0),
            test_x0: X0::initial(),
            test_volume: 0.0,
            step: 0,
            accepted: 0,
            max_iter,
            max_accept,
            conv_crit,
            fit_ndof,
            repetition,
            seed,
        }
    }

    /// Writes the state under `path` in the result store.
    pub fn snapshot(&self, store: &mut ResultStore, path: &str) {
        store.put(path, "modelI", self.model_i.clone());
        store.put(path, "scaling", self.x0.scaling);
        store.put(path, "background", self.x0.background);
        store.put(path, "gof", self.gof);
        store.put(path, "step", self.step);
        store.put(path, "accepted", self.accepted);
        store.put(path, "maxIter", self.max_iter);
        store.put(path, "maxAccept", self.max_accept);
        store.put(path, "convCrit", self.conv_crit);
        store.put(path, "fitNDoF", crate::convert::u64_from_usize(self.fit_ndof));
        store.put(path, "repetition", crate::convert::u64_from_usize(self.repetition));
        store.put(path, "seed", self.seed);
    }

    /// Reads a state back from `path` in the result store.
    ///
    /// # Errors
    ///
    /// Returns store lookup errors when an entry is missing or mistyped.
    pub fn restore(store: &ResultStore, path: &str) -> Result<Self> {
        let x0 = X0 {
            scaling: store.get_f64(path, "scaling")?,
            background: store.get_f64(path, "background")?,
        };
        let model_i = store.get_array1(path, "modelI")?;

        Ok(Self {
            test_model_i: Array1::zeros(model_i.len()),
            model_i,
            x0,
            gof: store.get_f64(path, "gof")?,
            test_x0: x0,
            test_volume: 0.0,
            step: store.get_u64(path, "step")?,
            accepted: store.get_u64(path, "accepted")?,
            max_iter: store.get_u64(path, "maxIter")?,
            max_accept: store.get_u64(path, "maxAccept")?,
            conv_crit: store.get_f64(path, "convCrit")?,
            fit_ndof: crate::convert::usize_from_u64(store.get_u64(path, "fitNDoF")?),
            repetition: crate::convert::usize_from_u64(store.get_u64(path, "repetition")?),
            seed: store.get_u64(path, "seed")?,
        })
    }
}
