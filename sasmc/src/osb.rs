//! Closed-form solver for the scaling factor and flat background.
//!
//! At every Monte Carlo evaluation the trial model intensity `m` is aligned
//! to the measured curve by minimizing the reduced chi-squared
//!
//! ```text
//! chi²_red(s, b) = 1/(K - nu) * sum_k [(I_k - (s m_k + b)) / sigma_k]²
//! ```
//!
//! over the scaling `s` and background `b`. The residual is linear in both,
//! so the minimum follows from the 2x2 weighted normal equations; no
//! iterative search is involved.

use super::convert;
use super::error::{Error, Result};
use itertools::izip;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Linear alignment of a model intensity to the data: `I ≈ scaling·m + background`.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct X0 {
    /// Multiplicative scaling factor.
    pub scaling: f64,
    /// Flat background level.
    pub background: f64,
}

impl X0 {
    /// A neutral starting guess.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            scaling: 1.0,
            background: 0.0,
        }
    }
}

/// Weighted least-squares solver for scaling and background, bound to one
/// measured curve.
///
/// Points with zero uncertainty are excluded from the fit; they carry no
/// usable weight.
#[derive(Clone, Debug)]
pub struct Osb {
    intensity: Array1<f64>,
    weights: Array1<f64>,
    n_used: usize,
    ndof: usize,
}

impl Osb {
    /// Builds the solver from the measured intensity and its uncertainty.
    ///
    /// `ndof` is the number of degrees of freedom consumed by the linear fit
    /// (2 for scaling plus background); it only enters the chi-squared
    /// normalization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataInvalid`] when fewer than `ndof + 1` points carry
    /// a nonzero uncertainty.
    pub fn new(intensity: &Array1<f64>, sigma: &Array1<f64>, ndof: usize) -> Result<Self> {
        let weights = sigma.mapv(|s| if s > 0.0 { 1.0 / (s * s) } else { 0.0 });
        let n_used = weights.iter().filter(|&&w| w > 0.0).count();
        if n_used <= ndof {
            return Err(Error::DataInvalid(format!(
                "only {n_used} weighted points for a fit consuming {ndof} degrees of freedom"
            )));
        }

        Ok(Self {
            intensity: intensity.clone(),
            weights,
            n_used,
            ndof,
        })
    }

    /// Solves for the optimal scaling and background of `model_i` and returns
    /// them together with the resulting goodness of fit.
    ///
    /// The warm start is part of the interface but not needed by the closed
    /// form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IllConditioned`] when the normal matrix is singular,
    /// e.g. for a constant model intensity that is degenerate with the
    /// background.
    pub fn solve(&self, model_i: &Array1<f64>, warm_start: X0) -> Result<(X0, f64)> {
        let _ = warm_start;

        let mut s_w = 0.0;
        let mut s_m = 0.0;
        let mut s_mm = 0.0;
        let mut s_i = 0.0;
        let mut s_im = 0.0;
        for (&w, &i, &m) in izip!(&self.weights, &self.intensity, model_i) {
            s_w += w;
            s_m += w * m;
            s_mm += w * m * m;
            s_i += w * i;
            s_im += w * i * m;
        }

        let det = s_mm.mul_add(s_w, -(s_m * s_m));
        if !det.is_finite() || det.abs() <= 1.0e-12 * (s_mm * s_w).abs() {
            return Err(Error::IllConditioned);
        }

        let scaling = s_im.mul_add(s_w, -(s_m * s_i)) / det;
        let background = s_mm.mul_add(s_i, -(s_m * s_im)) / det;

        let mut chi2 = 0.0;
        for (&w, &i, &m) in izip!(&self.weights, &self.intensity, model_i) {
            let residual = i - scaling.mul_add(m, background);
            chi2 += w * residual * residual;
        }
        let gof = chi2 / convert::f64_from_usize(self.n_used - self.ndof);

        Ok((
            X0 {
                scaling,
                background,
            },
            gof,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_cmp::assert_approx_eq;
    use ndarray::{array, Array1};

    #[test]
    fn recovers_exact_scaling_and_background() {
        let model: Array1<f64> = Array1::linspace(1.0, 10.0, 20).mapv(|x| 1.0 / (x * x));
        let intensity = model.mapv(|m| 2.5 * m + 0.75);
        let sigma = intensity.mapv(|i| 0.01 * i);

        let osb = Osb::new(&intensity, &sigma, 2).unwrap();
        let (x0, gof) = osb.solve(&model, X0::initial()).unwrap();

        assert_approx_eq!(f64, x0.scaling, 2.5, epsilon = 1e-10);
        assert_approx_eq!(f64, x0.background, 0.75, epsilon = 1e-10);
        assert_approx_eq!(f64, gof, 0.0, epsilon = 1e-16);
    }

    #[test]
    fn reduced_chi_squared_uses_the_configured_dof() {
        // unit weights and a model the data cannot follow exactly, so the
        // residual chi-squared is nonzero and the normalization shows
        let intensity = array![1.0, 3.0, 2.0];
        let sigma = array![1.0, 1.0, 1.0];
        let model = array![0.0, 2.0, 4.0];

        let osb = Osb::new(&intensity, &sigma, 2).unwrap();
        let (_, gof_two) = osb.solve(&model, X0::initial()).unwrap();

        let osb_one = Osb::new(&intensity, &sigma, 1).unwrap();
        let (_, gof_one) = osb_one.solve(&model, X0::initial()).unwrap();

        // same chi², different normalization: (K - 1) = 2 vs (K - 2) = 1
        assert_approx_eq!(f64, gof_two / gof_one, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn excludes_zero_sigma_points() {
        let model = array![1.0, 2.0, 3.0, 100.0];
        // the last point would dominate the fit, but its sigma is zero
        let intensity = array![2.0, 4.0, 6.0, 1.0e6];
        let sigma = array![0.1, 0.1, 0.1, 0.0];

        let osb = Osb::new(&intensity, &sigma, 2).unwrap();
        let (x0, _) = osb.solve(&model, X0::initial()).unwrap();

        assert_approx_eq!(f64, x0.scaling, 2.0, epsilon = 1e-9);
        assert_approx_eq!(f64, x0.background, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn constant_model_is_ill_conditioned() {
        let intensity = array![1.0, 2.0, 3.0];
        let sigma = array![0.1, 0.1, 0.1];
        let model = array![4.0, 4.0, 4.0];

        let osb = Osb::new(&intensity, &sigma, 2).unwrap();
        assert!(matches!(
            osb.solve(&model, X0::initial()),
            Err(Error::IllConditioned)
        ));
    }

    #[test]
    fn too_few_weighted_points() {
        let intensity = array![1.0, 2.0, 3.0];
        let sigma = array![0.1, 0.0, 0.0];

        assert!(matches!(
            Osb::new(&intensity, &sigma, 2),
            Err(Error::DataInvalid(_))
        ));
    }
}
