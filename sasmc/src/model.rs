//! Contribution ensemble and its sampling prior.

use super::error::{Error, Result};
use super::kernel::Params;
use super::store::ResultStore;
use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a fit parameter is drawn between its pick bounds.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorDist {
    /// Uniform in linear space.
    #[default]
    Uniform,
    /// Uniform in log space.
    Log,
}

impl PriorDist {
    const fn tag(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Log => "log",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "uniform" => Ok(Self::Uniform),
            "log" => Ok(Self::Log),
            _ => Err(Error::ConfigInvalid(format!(
                "unknown pick distribution '{tag}'"
            ))),
        }
    }
}

/// Random-pick bounds and distribution for one fit parameter.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParamPrior {
    /// Lower pick bound.
    pub low: f64,
    /// Upper pick bound.
    pub high: f64,
    /// Distribution between the bounds.
    #[serde(default)]
    pub dist: PriorDist,
}

impl ParamPrior {
    /// Draws one value from the prior.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        match self.dist {
            PriorDist::Uniform => (self.high - self.low).mul_add(u, self.low),
            PriorDist::Log => {
                let low = self.low.ln();
                (self.high.ln() - low).mul_add(u, low).exp()
            }
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        if !(self.low.is_finite() && self.high.is_finite()) {
            return Err(Error::ConfigInvalid(format!(
                "'{name}': pick bounds must be finite"
            )));
        }
        if self.low >= self.high {
            return Err(Error::ConfigInvalid(format!(
                "'{name}': pick bounds [{}, {}] are not ascending",
                self.low, self.high
            )));
        }
        if self.dist == PriorDist::Log && self.low <= 0.0 {
            return Err(Error::ConfigInvalid(format!(
                "'{name}': log-space picks need a positive lower bound"
            )));
        }
        Ok(())
    }
}

/// The ensemble of contributions whose summed form factor makes up the model
/// intensity.
///
/// Contributions are rows of a parameter table, one column per fit parameter
/// in lexicographic name order. The volume of every contribution is kept in
/// step with the table by [`Ensemble::commit`].
#[derive(Clone, Debug)]
pub struct Ensemble {
    model_name: String,
    fit_names: Vec<String>,
    priors: Vec<ParamPrior>,
    parameter_set: Array2<f64>,
    volumes: Array1<f64>,
    static_parameters: Params,
    pick: Array1<f64>,
}

impl Ensemble {
    /// Draws `n_contrib` independent initial contributions from the prior.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] when the ensemble would be empty,
    /// when a prior is malformed, or when a fit parameter is also listed as a
    /// static parameter.
    pub fn new<R: Rng + ?Sized>(
        n_contrib: usize,
        model_name: &str,
        limits: &BTreeMap<String, ParamPrior>,
        static_parameters: Params,
        rng: &mut R,
    ) -> Result<Self> {
        if n_contrib == 0 {
            return Err(Error::ConfigInvalid(
                "at least one contribution is required".to_owned(),
            ));
        }
        if limits.is_empty() {
            return Err(Error::ConfigInvalid(
                "at least one fit parameter is required".to_owned(),
            ));
        }
        for (name, prior) in limits {
            prior.validate(name)?;
            if static_parameters.contains_key(name) {
                return Err(Error::ConfigInvalid(format!(
                    "'{name}' is both a fit and a static parameter"
                )));
            }
        }

        let fit_names: Vec<String> = limits.keys().cloned().collect();
        let priors: Vec<ParamPrior> = limits.values().copied().collect();
        let mut parameter_set = Array2::zeros((n_contrib, fit_names.len()));
        for mut row in parameter_set.rows_mut() {
            for (slot, prior) in row.iter_mut().zip(&priors) {
                *slot = prior.sample(rng);
            }
        }

        Ok(Self {
            model_name: model_name.to_owned(),
            pick: Array1::zeros(fit_names.len()),
            volumes: Array1::zeros(n_contrib),
            fit_names,
            priors,
            parameter_set,
            static_parameters,
        })
    }

    /// Returns the number of contributions.
    #[must_use]
    pub fn n_contrib(&self) -> usize {
        self.parameter_set.nrows()
    }

    /// Returns the name of the kernel this ensemble belongs to.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns the fit parameter names, in table-column order.
    #[must_use]
    pub fn fit_names(&self) -> &[String] {
        &self.fit_names
    }

    /// Returns the per-contribution volumes.
    #[must_use]
    pub const fn volumes(&self) -> &Array1<f64> {
        &self.volumes
    }

    /// Returns the fixed kernel parameters.
    #[must_use]
    pub const fn static_parameters(&self) -> &Params {
        &self.static_parameters
    }

    /// Returns the column of values of one fit parameter across all
    /// contributions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] for a name that is not a fit
    /// parameter of this ensemble.
    pub fn values(&self, parameter: &str) -> Result<Array1<f64>> {
        let column = self
            .fit_names
            .iter()
            .position(|name| name == parameter)
            .ok_or_else(|| {
                Error::ConfigInvalid(format!("'{parameter}' is not a fit parameter"))
            })?;
        Ok(self.parameter_set.column(column).to_owned())
    }

    /// Draws a fresh candidate contribution into the pick scratch row. The
    /// parameter table is untouched.
    pub fn pick<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for (slot, prior) in self.pick.iter_mut().zip(&self.priors) {
            *slot = prior.sample(rng);
        }
    }

    /// Replaces contribution `i` with the current pick and records its
    /// volume.
    pub fn commit(&mut self, i: usize, volume: f64) {
        self.parameter_set.row_mut(i).assign(&self.pick);
        self.volumes[i] = volume;
    }

    pub(crate) fn set_volume(&mut self, i: usize, volume: f64) {
        self.volumes[i] = volume;
    }

    fn assemble(&self, row: ndarray::ArrayView1<f64>) -> Params {
        let mut params = self.static_parameters.clone();
        for (name, &value) in self.fit_names.iter().zip(&row) {
            params.insert(name.clone(), value);
        }
        params
    }

    /// Full parameter mapping (fit plus static) of contribution `i`.
    #[must_use]
    pub fn contribution_params(&self, i: usize) -> Params {
        self.assemble(self.parameter_set.row(i))
    }

    /// Full parameter mapping of the current pick.
    #[must_use]
    pub fn pick_params(&self) -> Params {
        self.assemble(self.pick.view())
    }

    /// Writes the ensemble under `path` in the result store.
    pub fn snapshot(&self, store: &mut ResultStore, path: &str) {
        store.put(path, "modelName", self.model_name.as_str());
        store.put(path, "parameterNames", self.fit_names.clone());
        store.put(path, "parameterSet", self.parameter_set.clone());
        store.put(path, "volumes", self.volumes.clone());
        store.put(
            path,
            "staticParameterNames",
            self.static_parameters.keys().cloned().collect::<Vec<_>>(),
        );
        store.put(
            path,
            "staticParameterValues",
            Array1::from_iter(self.static_parameters.values().copied()),
        );
        store.put(
            path,
            "pickLow",
            Array1::from_iter(self.priors.iter().map(|prior| prior.low)),
        );
        store.put(
            path,
            "pickHigh",
            Array1::from_iter(self.priors.iter().map(|prior| prior.high)),
        );
        store.put(
            path,
            "pickDistribution",
            self.priors
                .iter()
                .map(|prior| prior.dist.tag().to_owned())
                .collect::<Vec<_>>(),
        );
    }

    /// Reads an ensemble back from `path` in the result store.
    ///
    /// # Errors
    ///
    /// Returns store lookup errors, or [`Error::WrongType`] when the stored
    /// table shape disagrees with the stored names and volumes.
    pub fn restore(store: &ResultStore, path: &str) -> Result<Self> {
        let model_name = store.get_str(path, "modelName")?.to_owned();
        let fit_names = store.get_strings(path, "parameterNames")?.to_vec();
        let parameter_set = store.get_array2(path, "parameterSet")?;
        let volumes = store.get_array1(path, "volumes")?;

        let static_names = store.get_strings(path, "staticParameterNames")?;
        let static_values = store.get_array1(path, "staticParameterValues")?;
        let low = store.get_array1(path, "pickLow")?;
        let high = store.get_array1(path, "pickHigh")?;
        let dist = store.get_strings(path, "pickDistribution")?;

        if parameter_set.ncols() != fit_names.len()
            || parameter_set.nrows() != volumes.len()
            || low.len() != fit_names.len()
            || high.len() != fit_names.len()
            || dist.len() != fit_names.len()
            || static_names.len() != static_values.len()
        {
            return Err(Error::WrongType {
                path: path.to_owned(),
                name: "parameterSet".to_owned(),
            });
        }

        let priors = dist
            .iter()
            .zip(low.iter().zip(&high))
            .map(|(tag, (&low, &high))| {
                Ok(ParamPrior {
                    low,
                    high,
                    dist: PriorDist::from_tag(tag)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let static_parameters = static_names
            .iter()
            .cloned()
            .zip(static_values.iter().copied())
            .collect();

        Ok(Self {
            model_name,
            pick: Array1::zeros(fit_names.len()),
            fit_names,
            priors,
            parameter_set,
            volumes,
            static_parameters,
        })
    }
}
