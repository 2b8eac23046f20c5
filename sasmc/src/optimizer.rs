//! The Monte Carlo accept/reject core of one repetition.
//!
//! A repetition starts from an ensemble freshly drawn from the prior, sums
//! the volume-weighted intensities of all contributions and then perturbs
//! one contribution at a time, in strict round-robin order. A perturbation
//! is kept only when the re-fitted goodness of fit improves; ties are
//! rejected. The prior draws provide all stochastic exploration, so no
//! acceptance temperature is involved.

use super::convert;
use super::data::MeasData;
use super::error::{Error, Result};
use super::kernel::{self, Kernel, Params};
use super::model::Ensemble;
use super::opt::OptState;
use super::osb::Osb;
use super::store::ResultStore;
use ndarray::Array1;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Result-file group holding the ensembles, one child group per repetition.
pub const MODEL_GROUP: &str = "/entry1/analysis/MCResult1/model";
/// Result-file group holding the optimization state, one child group per
/// repetition.
pub const OPTIMIZATION_GROUP: &str = "/entry1/analysis/MCResult1/optimization";

/// Steps between progress events and cancellation checks.
const CHECK_INTERVAL: u64 = 1000;

// reloaded state must reproduce the stored scalars to 3 significant figures
const RELOAD_RTOL: f64 = 5.0e-3;

/// Path of the stored ensemble of `repetition`.
#[must_use]
pub fn model_path(repetition: usize) -> String {
    format!("{MODEL_GROUP}/repetition{repetition}")
}

/// Path of the stored optimization state of `repetition`.
#[must_use]
pub fn optimization_path(repetition: usize) -> String {
    format!("{OPTIMIZATION_GROUP}/repetition{repetition}")
}

fn check_reload(name: &str, stored: f64, computed: f64) -> Result<()> {
    let scale = stored.abs().max(computed.abs());
    if stored == computed || (stored - computed).abs() <= RELOAD_RTOL * scale {
        Ok(())
    } else {
        Err(Error::ReloadMismatch {
            name: name.to_owned(),
            stored,
            computed,
        })
    }
}

/// One Monte Carlo repetition: measured data, kernel, ensemble and
/// optimization state, plus the repetition-owned RNG.
pub struct Optimizer {
    meas: MeasData,
    kernel: Box<dyn Kernel>,
    ensemble: Ensemble,
    opt: OptState,
    osb: Osb,
    rng: Pcg64,
}

impl Optimizer {
    /// Assembles a repetition and computes its initial model intensity,
    /// scaling, background and goodness of fit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataInvalid`] when the kernel's Q-grid disagrees
    /// with the data, and any kernel or solver error of the initial
    /// evaluation.
    pub fn new(
        meas: MeasData,
        kernel: Box<dyn Kernel>,
        ensemble: Ensemble,
        opt: OptState,
    ) -> Result<Self> {
        if kernel.q().len() != meas.len() {
            return Err(Error::DataInvalid(format!(
                "kernel Q-grid has {} points, data has {}",
                kernel.q().len(),
                meas.len()
            )));
        }
        let osb = Osb::new(meas.intensity(), meas.sigma(), opt.fit_ndof)?;
        let rng = Pcg64::seed_from_u64(opt.seed);

        let mut optimizer = Self {
            meas,
            kernel,
            ensemble,
            opt,
            osb,
            rng,
        };
        optimizer.init()?;
        Ok(optimizer)
    }

    /// Recreates a stored repetition and verifies it against the stored
    /// optimization scalars.
    ///
    /// The model intensity, scaling, background and goodness of fit are
    /// recomputed from scratch; a disagreement with the stored values beyond
    /// 3 significant figures means the kernel or the snapshot drifted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReloadMismatch`] on such a disagreement (including a
    /// stored intensity length that does not match the data), plus any store
    /// lookup or kernel error.
    pub fn load(meas: MeasData, store: &ResultStore, repetition: usize) -> Result<Self> {
        let ensemble = Ensemble::restore(store, &model_path(repetition))?;
        let stored = OptState::restore(store, &optimization_path(repetition))?;

        if stored.model_i.len() != meas.len() {
            return Err(Error::ReloadMismatch {
                name: "modelI length".to_owned(),
                stored: convert::f64_from_usize(stored.model_i.len()),
                computed: convert::f64_from_usize(meas.len()),
            });
        }

        let kernel = kernel::from_name(ensemble.model_name(), meas.q().clone())?;
        let osb = Osb::new(meas.intensity(), meas.sigma(), stored.fit_ndof)?;
        let rng = Pcg64::seed_from_u64(stored.seed);

        let mut optimizer = Self {
            meas,
            kernel,
            ensemble,
            opt: stored.clone(),
            osb,
            rng,
        };
        optimizer.init()?;

        check_reload("gof", stored.gof, optimizer.opt.gof)?;
        check_reload("scaling", stored.x0.scaling, optimizer.opt.x0.scaling)?;
        check_reload(
            "background",
            stored.x0.background,
            optimizer.opt.x0.background,
        )?;

        Ok(optimizer)
    }

    /// Returns the ensemble.
    #[must_use]
    pub const fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Returns the optimization state.
    #[must_use]
    pub const fn opt(&self) -> &OptState {
        &self.opt
    }

    /// Evaluates the kernel and turns its output into the volume-weighted
    /// intensity a single contribution adds to the model.
    fn contribution_intensity(&self, params: &Params) -> Result<(Array1<f64>, f64)> {
        let eval = self.kernel.evaluate(params)?;
        if !eval.volume.is_finite()
            || eval.volume <= 0.0
            || eval.fsq.iter().any(|value| !value.is_finite())
        {
            return Err(Error::KernelFailure(
                "non-finite intensity or volume".to_owned(),
            ));
        }
        Ok((eval.fsq / eval.volume, eval.volume))
    }

    // sum all contributions and fit scaling/background once
    fn init(&mut self) -> Result<()> {
        let n_contrib = convert::f64_from_usize(self.ensemble.n_contrib());
        let mut model_i = Array1::zeros(self.meas.len());
        for i in 0..self.ensemble.n_contrib() {
            let (intensity, volume) =
                self.contribution_intensity(&self.ensemble.contribution_params(i))?;
            model_i += &(intensity / n_contrib);
            self.ensemble.set_volume(i, volume);
        }

        let (x0, gof) = self.osb.solve(&model_i, self.opt.x0)?;
        self.opt.model_i = model_i;
        self.opt.x0 = x0;
        self.opt.test_x0 = x0;
        self.opt.gof = gof;
        Ok(())
    }

    /// Contribution revisited at the current step; strict round robin, so a
    /// second RNG stream is not needed.
    fn contrib_index(&self) -> usize {
        convert::usize_from_u64(self.opt.step % convert::u64_from_usize(self.ensemble.n_contrib()))
    }

    // replace one contribution by the pick, recompute intensity and refit.
    // The old row is re-evaluated through the kernel because the update needs
    // its intensity, not just the cached volume.
    fn re_evaluate(&mut self) -> Result<f64> {
        let (old_i, _) =
            self.contribution_intensity(&self.ensemble.contribution_params(self.contrib_index()))?;
        let (pick_i, pick_volume) = self.contribution_intensity(&self.ensemble.pick_params())?;

        let n_contrib = convert::f64_from_usize(self.ensemble.n_contrib());
        self.opt.test_model_i = &self.opt.model_i + &((pick_i - old_i) / n_contrib);
        self.opt.test_volume = pick_volume;

        let (test_x0, gof) = self.osb.solve(&self.opt.test_model_i, self.opt.x0)?;
        self.opt.test_x0 = test_x0;
        Ok(gof)
    }

    fn accept(&mut self) {
        let index = self.contrib_index();
        self.ensemble.commit(index, self.opt.test_volume);
        self.opt.model_i.assign(&self.opt.test_model_i);
        self.opt.x0 = self.opt.test_x0;
        self.opt.accepted += 1;
    }

    /// One pick / evaluate / accept-or-reject step.
    ///
    /// An ill-conditioned trial fit counts as a rejection; it means the pick
    /// was degenerate, not that the repetition failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KernelFailure`] when a kernel evaluation fails.
    pub fn iterate(&mut self) -> Result<()> {
        self.ensemble.pick(&mut self.rng);
        match self.re_evaluate() {
            Ok(new_gof) if new_gof < self.opt.gof => {
                self.accept();
                self.opt.gof = new_gof;
            }
            Ok(_) | Err(Error::IllConditioned) => {}
            Err(err) => return Err(err),
        }
        self.opt.step += 1;
        Ok(())
    }

    /// Runs the accept/reject loop until one of the targets is reached:
    /// enough accepted moves, the step budget, or the convergence criterion.
    ///
    /// The cancellation flag is checked after every accepted move and at
    /// least every 1000 steps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the flag was raised, or any fatal
    /// step error.
    pub fn optimize(&mut self, cancel: &AtomicBool) -> Result<()> {
        info!(
            repetition = self.opt.repetition,
            gof = self.opt.gof,
            "optimization started"
        );
        if cancel.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }

        while self.opt.accepted < self.opt.max_accept
            && self.opt.step < self.opt.max_iter
            && self.opt.gof > self.opt.conv_crit
        {
            let accepted_before = self.opt.accepted;
            self.iterate()?;

            if (self.opt.accepted != accepted_before || self.opt.step % CHECK_INTERVAL == 0)
                && cancel.load(Ordering::Relaxed)
            {
                return Err(Error::Cancelled);
            }
            if self.opt.step % CHECK_INTERVAL == 0 {
                debug!(
                    repetition = self.opt.repetition,
                    gof = self.opt.gof,
                    accepted = self.opt.accepted,
                    step = self.opt.step,
                    "progress"
                );
            }
        }

        info!(
            repetition = self.opt.repetition,
            gof = self.opt.gof,
            accepted = self.opt.accepted,
            step = self.opt.step,
            "optimization finished"
        );
        Ok(())
    }

    /// Writes the ensemble and optimization snapshots under this
    /// repetition's paths.
    pub fn store(&self, store: &mut ResultStore) {
        self.ensemble
            .snapshot(store, &model_path(self.opt.repetition));
        self.opt
            .snapshot(store, &optimization_path(self.opt.repetition));
    }

    /// Recomputes the total model intensity from the parameter table alone.
    ///
    /// The optimizer updates its intensity incrementally; this is the
    /// reference value the increments must stay consistent with.
    ///
    /// # Errors
    ///
    /// Returns any kernel error.
    pub fn recompute_model_i(&self) -> Result<Array1<f64>> {
        let n_contrib = convert::f64_from_usize(self.ensemble.n_contrib());
        let mut model_i = Array1::zeros(self.meas.len());
        for i in 0..self.ensemble.n_contrib() {
            let (intensity, _) =
                self.contribution_intensity(&self.ensemble.contribution_params(i))?;
            model_i += &(intensity / n_contrib);
        }
        Ok(model_i)
    }
}
