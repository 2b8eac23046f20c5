//! Measured one-dimensional scattering data.

use super::error::{Error, Result};
use itertools::izip;
use ndarray::Array1;

/// A measured one-dimensional scattering curve.
///
/// Three parallel vectors over the momentum-transfer axis: `q` (strictly
/// positive and strictly increasing), the measured intensity and its
/// per-point uncertainty. Immutable for the duration of a run.
#[derive(Clone, Debug)]
pub struct MeasData {
    q: Array1<f64>,
    intensity: Array1<f64>,
    sigma: Array1<f64>,
}

impl MeasData {
    /// Validates and wraps the three measured vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataInvalid`] when the lengths differ, any value is
    /// non-finite, `q` is not strictly positive and strictly increasing, or
    /// any uncertainty is negative.
    pub fn new(q: Array1<f64>, intensity: Array1<f64>, sigma: Array1<f64>) -> Result<Self> {
        if q.len() != intensity.len() || q.len() != sigma.len() {
            return Err(Error::DataInvalid(format!(
                "vector lengths differ: Q has {}, I has {}, ISigma has {}",
                q.len(),
                intensity.len(),
                sigma.len()
            )));
        }
        if q.is_empty() {
            return Err(Error::DataInvalid("empty data set".to_owned()));
        }
        for (index, (&qk, &ik, &sk)) in izip!(&q, &intensity, &sigma).enumerate() {
            if !(qk.is_finite() && ik.is_finite() && sk.is_finite()) {
                return Err(Error::DataInvalid(format!(
                    "non-finite value at point {index}"
                )));
            }
            if qk <= 0.0 {
                return Err(Error::DataInvalid(format!(
                    "non-positive Q = {qk} at point {index}"
                )));
            }
            if sk < 0.0 {
                return Err(Error::DataInvalid(format!(
                    "negative ISigma = {sk} at point {index}"
                )));
            }
        }
        if q.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(Error::DataInvalid(
                "Q must be strictly increasing".to_owned(),
            ));
        }

        Ok(Self {
            q,
            intensity,
            sigma,
        })
    }

    /// Returns the momentum-transfer axis.
    #[must_use]
    pub const fn q(&self) -> &Array1<f64> {
        &self.q
    }

    /// Returns the measured intensity.
    #[must_use]
    pub const fn intensity(&self) -> &Array1<f64> {
        &self.intensity
    }

    /// Returns the per-point uncertainty of the intensity.
    #[must_use]
    pub const fn sigma(&self) -> &Array1<f64> {
        &self.sigma
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// Returns `true` if the data set holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn accepts_valid_data() {
        let data = MeasData::new(
            array![0.1, 0.2, 0.3],
            array![10.0, 5.0, 1.0],
            array![0.1, 0.05, 0.01],
        )
        .unwrap();

        assert_eq!(data.len(), 3);
        assert!(!data.is_empty());
    }

    #[test]
    fn rejects_unequal_lengths() {
        let result = MeasData::new(array![0.1, 0.2], array![10.0], array![0.1]);
        assert!(matches!(result, Err(Error::DataInvalid(_))));
    }

    #[test]
    fn rejects_non_positive_q() {
        let result = MeasData::new(array![0.0, 0.2], array![10.0, 5.0], array![0.1, 0.1]);
        assert!(matches!(result, Err(Error::DataInvalid(_))));
    }

    #[test]
    fn rejects_decreasing_q() {
        let result = MeasData::new(array![0.2, 0.1], array![10.0, 5.0], array![0.1, 0.1]);
        assert!(matches!(result, Err(Error::DataInvalid(_))));
    }

    #[test]
    fn rejects_negative_sigma() {
        let result = MeasData::new(array![0.1, 0.2], array![10.0, 5.0], array![0.1, -0.1]);
        assert!(matches!(result, Err(Error::DataInvalid(_))));
    }

    #[test]
    fn rejects_non_finite_intensity() {
        let result = MeasData::new(array![0.1, 0.2], array![f64::NAN, 5.0], array![0.1, 0.1]);
        assert!(matches!(result, Err(Error::DataInvalid(_))));
    }
}
