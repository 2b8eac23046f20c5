//! Parallel execution of the independent repetitions of a run.
//!
//! Repetitions share nothing: each worker owns its ensemble, optimization
//! state, kernel and RNG. Per-repetition seeds are derived from the base
//! seed alone, so the stored result is independent of the worker count.
//! Snapshots are written by a single writer, in ascending repetition order,
//! and only when every repetition finished; a cancelled or failed run leaves
//! no partial checkpoints behind.

use super::config::RunConfig;
use super::data::MeasData;
use super::error::{Error, Result};
use super::kernel;
use super::model::Ensemble;
use super::opt::OptState;
use super::optimizer::Optimizer;
use super::store::ResultStore;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use rayon::prelude::*;
use std::sync::atomic::AtomicBool;
use tracing::info;

fn build_repetition(
    meas: &MeasData,
    config: &RunConfig,
    base_seed: u64,
    repetition: usize,
) -> Result<Optimizer> {
    let seed = base_seed.wrapping_add(super::convert::u64_from_usize(repetition));
    let mut rng = Pcg64::seed_from_u64(seed);
    let ensemble = Ensemble::new(
        config.n_contrib,
        &config.model_name,
        &config.fit_parameter_limits,
        config.static_parameters.clone(),
        &mut rng,
    )?;
    let kernel = kernel::from_name(&config.model_name, meas.q().clone())?;
    let opt = OptState::new(
        config.max_iter,
        config.max_accept,
        config.conv_crit,
        config.fit_ndof,
        repetition,
        seed,
    );
    Optimizer::new(meas.clone(), kernel, ensemble, opt)
}

/// Runs `config.n_rep` independent repetitions and writes every snapshot
/// into `store`.
///
/// # Errors
///
/// Returns [`Error::ConfigInvalid`] for a bad configuration,
/// [`Error::Cancelled`] when the flag was raised, and the first error of any
/// failed repetition. On error nothing is written.
pub fn run(
    meas: &MeasData,
    config: &RunConfig,
    store: &mut ResultStore,
    cancel: &AtomicBool,
) -> Result<()> {
    config.validate()?;
    let base_seed = config.seed.unwrap_or_else(rand::random);
    info!(
        n_rep = config.n_rep,
        n_contrib = config.n_contrib,
        model = config.model_name.as_str(),
        base_seed,
        "starting Monte Carlo run"
    );

    let work = || -> Result<Vec<Optimizer>> {
        (0..config.n_rep)
            .into_par_iter()
            .map(|repetition| {
                let mut optimizer = build_repetition(meas, config, base_seed, repetition)?;
                optimizer.optimize(cancel)?;
                Ok(optimizer)
            })
            .collect()
    };

    let optimizers = match config.n_threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| Error::ConfigInvalid(format!("cannot build worker pool: {err}")))?
            .install(work),
        None => work(),
    }?;

    for optimizer in &optimizers {
        optimizer.store(store);
    }
    info!(n_rep = config.n_rep, "run finished, snapshots stored");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ParamPrior, PriorDist};
    use crate::optimizer;
    use ndarray::Array1;
    use std::collections::BTreeMap;
    use std::sync::atomic::Ordering;

    fn synthetic_data() -> MeasData {
        let q = Array1::linspace(0.005, 0.5, 40);
        let kernel = kernel::from_name("sphere", q.clone()).unwrap();
        let mut params = BTreeMap::new();
        params.insert("radius".to_owned(), 30.0);
        let eval = kernel.evaluate(&params).unwrap();
        let intensity = eval.fsq.mapv(|f| f / eval.volume + 0.05);
        let sigma = intensity.mapv(|i| 0.01 * i);
        MeasData::new(q, intensity, sigma).unwrap()
    }

    fn config(n_rep: usize, n_threads: Option<usize>) -> RunConfig {
        let mut limits = BTreeMap::new();
        limits.insert(
            "radius".to_owned(),
            ParamPrior {
                low: 5.0,
                high: 100.0,
                dist: PriorDist::Log,
            },
        );
        RunConfig {
            n_contrib: 15,
            n_rep,
            model_name: "sphere".to_owned(),
            static_parameters: crate::kernel::Params::new(),
            fit_parameter_limits: limits,
            max_iter: 500,
            max_accept: 100,
            conv_crit: 1.0e-9,
            seed: Some(77),
            fit_ndof: 2,
            n_threads,
        }
    }

    #[test]
    fn stores_every_repetition() {
        let meas = synthetic_data();
        let mut store = ResultStore::new();
        let cancel = AtomicBool::new(false);
        run(&meas, &config(3, None), &mut store, &cancel).unwrap();

        assert_eq!(store.repetition_ids(optimizer::MODEL_GROUP), [0, 1, 2]);
        assert_eq!(
            store.repetition_ids(optimizer::OPTIMIZATION_GROUP),
            [0, 1, 2]
        );
    }

    #[test]
    fn result_is_independent_of_the_worker_count() {
        let meas = synthetic_data();
        let cancel = AtomicBool::new(false);

        let mut serial = ResultStore::new();
        run(&meas, &config(3, Some(1)), &mut serial, &cancel).unwrap();
        let mut parallel = ResultStore::new();
        run(&meas, &config(3, Some(3)), &mut parallel, &cancel).unwrap();

        for repetition in 0..3 {
            let path = optimizer::model_path(repetition);
            assert_eq!(
                serial.get_array2(&path, "parameterSet").unwrap(),
                parallel.get_array2(&path, "parameterSet").unwrap()
            );
            let opt_path = optimizer::optimization_path(repetition);
            assert_eq!(
                serial.get_f64(&opt_path, "gof").unwrap(),
                parallel.get_f64(&opt_path, "gof").unwrap()
            );
        }
    }

    #[test]
    fn cancellation_leaves_the_store_empty() {
        let meas = synthetic_data();
        let mut store = ResultStore::new();
        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);

        assert!(matches!(
            run(&meas, &config(2, None), &mut store, &cancel),
            Err(Error::Cancelled)
        ));
        assert!(store.repetition_ids(optimizer::MODEL_GROUP).is_empty());
    }

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let meas = synthetic_data();
        let mut store = ResultStore::new();
        let cancel = AtomicBool::new(false);
        let mut bad = config(1, None);
        bad.n_contrib = 0;

        assert!(matches!(
            run(&meas, &bad, &mut store, &cancel),
            Err(Error::ConfigInvalid(_))
        ));
    }
}
