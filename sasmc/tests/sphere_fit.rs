#![allow(missing_docs)]

use float_cmp::assert_approx_eq;
use ndarray::Array1;
use sasmc::analysis;
use sasmc::config::RunConfig;
use sasmc::data::MeasData;
use sasmc::hist::{BinScale, HistRange, Weighting};
use sasmc::kernel::{self, Params};
use sasmc::model::{ParamPrior, PriorDist};
use sasmc::optimizer::{self, Optimizer};
use sasmc::runner;
use sasmc::store::ResultStore;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

const TRUE_RADIUS: f64 = 50.0;
const BACKGROUND: f64 = 0.1;

// noise-free curve of a monodisperse sphere population plus a flat
// background, with a 1% pseudo-uncertainty
fn synthetic_data(n_points: usize) -> MeasData {
    let q = Array1::linspace(0.002, 0.3, n_points);
    let kernel = kernel::from_name("sphere", q.clone()).unwrap();
    let mut params = Params::new();
    params.insert("radius".to_owned(), TRUE_RADIUS);
    let eval = kernel.evaluate(&params).unwrap();
    let intensity = eval.fsq.mapv(|f| f / eval.volume + BACKGROUND);
    let sigma = intensity.mapv(|i| 0.01 * i);
    MeasData::new(q, intensity, sigma).unwrap()
}

fn run_config(n_rep: usize) -> RunConfig {
    let mut limits = BTreeMap::new();
    limits.insert(
        "radius".to_owned(),
        ParamPrior {
            low: 1.0,
            high: 500.0,
            dist: PriorDist::Log,
        },
    );
    RunConfig {
        n_contrib: 50,
        n_rep,
        model_name: "sphere".to_owned(),
        static_parameters: Params::new(),
        fit_parameter_limits: limits,
        max_iter: 20_000,
        max_accept: 2_000,
        conv_crit: 1.0e-9,
        seed: Some(1234),
        fit_ndof: 2,
        n_threads: None,
    }
}

fn radius_range() -> HistRange {
    HistRange {
        parameter: "radius".to_owned(),
        range_min: 1.0,
        range_max: 500.0,
        n_bins: 40,
        bin_scale: BinScale::Log,
        weighting: Weighting::Vol,
    }
}

#[test]
fn recovers_a_monodisperse_population() {
    let meas = synthetic_data(80);
    let mut store = ResultStore::new();
    let cancel = AtomicBool::new(false);
    runner::run(&meas, &run_config(3), &mut store, &cancel).unwrap();

    let aggregate = analysis::aggregate(&store, &meas, &[radius_range()]).unwrap();
    assert_eq!(aggregate.repetitions, [0, 1, 2]);
    assert!(aggregate.failed.is_empty());

    // the fit must have moved well away from the random initial ensembles
    for repetition in 0..3 {
        let path = optimizer::optimization_path(repetition);
        assert!(store.get_u64(&path, "accepted").unwrap() > 0);
        assert!(store.get_f64(&path, "gof").unwrap().is_finite());
    }

    // volume-weighted mean radius lands near the true one; the tolerance is
    // wide because few contributions carry the whole distribution
    let mean_radius = aggregate.modes[0].mean.mean;
    assert!(
        (mean_radius - TRUE_RADIUS).abs() <= 0.5 * TRUE_RADIUS,
        "mean radius {mean_radius} too far from {TRUE_RADIUS}"
    );

    // recovered background lands near the synthetic one
    let background = aggregate.opts.background.mean;
    assert!(
        (background - BACKGROUND).abs() <= 0.5 * BACKGROUND,
        "background {background} too far from {BACKGROUND}"
    );

    // the scaled mean intensity reproduces the measured curve reasonably
    let measured_total = meas.intensity().sum();
    let modelled_total = aggregate.model_i_mean.sum();
    assert!((modelled_total - measured_total).abs() <= 0.2 * measured_total);
}

#[test]
fn every_stored_repetition_reloads_consistently() {
    let meas = synthetic_data(60);
    let mut store = ResultStore::new();
    let cancel = AtomicBool::new(false);
    runner::run(&meas, &run_config(2), &mut store, &cancel).unwrap();

    for repetition in 0..2 {
        let reloaded = Optimizer::load(meas.clone(), &store, repetition).unwrap();
        let path = optimizer::optimization_path(repetition);
        let stored_gof = store.get_f64(&path, "gof").unwrap();
        assert_approx_eq!(
            f64,
            reloaded.opt().gof,
            stored_gof,
            epsilon = 5.0e-3 * stored_gof
        );
    }
}

#[test]
fn single_repetition_spreads_are_zero() {
    let meas = synthetic_data(60);
    let mut store = ResultStore::new();
    let cancel = AtomicBool::new(false);
    runner::run(&meas, &run_config(1), &mut store, &cancel).unwrap();

    let aggregate = analysis::aggregate(&store, &meas, &[radius_range()]).unwrap();
    assert!(aggregate.histograms[0].y_std.iter().all(|&s| s == 0.0));
    assert!(aggregate.model_i_std.iter().all(|&s| s == 0.0));
    assert_eq!(aggregate.opts.gof.std, 0.0);
    assert_eq!(aggregate.opts.scaling.std, 0.0);
    for mode in aggregate.modes[0].as_array() {
        assert_eq!(mode.std, 0.0);
    }
}

#[test]
fn aggregation_is_idempotent() {
    let meas = synthetic_data(60);
    let mut store = ResultStore::new();
    let cancel = AtomicBool::new(false);
    runner::run(&meas, &run_config(2), &mut store, &cancel).unwrap();

    let first = analysis::aggregate(&store, &meas, &[radius_range()]).unwrap();
    let second = analysis::aggregate(&store, &meas, &[radius_range()]).unwrap();

    assert_eq!(first.repetitions, second.repetitions);
    assert_eq!(first.histograms[0].y_mean, second.histograms[0].y_mean);
    assert_eq!(first.histograms[0].y_std, second.histograms[0].y_std);
    assert_eq!(first.opts.gof.mean, second.opts.gof.mean);
    assert_eq!(first.model_i_mean, second.model_i_mean);
}

#[test]
fn histogram_conservation_across_the_full_pipeline() {
    let meas = synthetic_data(60);
    let mut store = ResultStore::new();
    let cancel = AtomicBool::new(false);
    runner::run(&meas, &run_config(2), &mut store, &cancel).unwrap();

    // a number-weighted histogram over the full prior support counts every
    // contribution exactly once
    let full_range = HistRange {
        weighting: Weighting::Num,
        ..radius_range()
    };
    let aggregate = analysis::aggregate(&store, &meas, &[full_range]).unwrap();
    assert_approx_eq!(
        f64,
        aggregate.histograms[0].y_mean.sum(),
        50.0,
        epsilon = 1.0e-9
    );
    assert_approx_eq!(f64, aggregate.modes[0].total_value.mean, 50.0, epsilon = 1.0e-9);
}
