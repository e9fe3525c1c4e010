use std::sync::Arc;

use isomc_core::{
    AccumulatedReading, AnalysisMethod, BlockDataSet, EnsembleRecord, IsoError, IsotopeSpecies,
    IsotopicRatio, ModelParameters,
};
use isomc_linalg::linear_knot_basis;
use isomc_stats::StatisticsEngine;

fn block() -> BlockDataSet {
    BlockDataSet {
        block_id: 9,
        detector_count: 1,
        isotope_count: 3,
        baseline: vec![AccumulatedReading::baseline(0, 0, 0.0)],
        onpeak_faraday: vec![AccumulatedReading::faraday(0, 2, 0, 10.0)],
        onpeak_photomultiplier: vec![AccumulatedReading::photomultiplier(2, 0, 9.0)],
        knot_basis: linear_knot_basis(6, 2).unwrap(),
        cycle_start_indices: vec![0, 3],
    }
}

fn method(derived: Vec<IsotopicRatio>) -> AnalysisMethod {
    AnalysisMethod::new(
        vec![
            IsotopeSpecies::new("204Pb"),
            IsotopeSpecies::new("207Pb"),
            IsotopeSpecies::new("206Pb"),
        ],
        vec![IsotopicRatio::new(0, 2), IsotopicRatio::new(1, 2)],
        derived,
        vec!["L1".to_string()],
    )
    .unwrap()
}

fn record(iteration: usize, log_ratios: [f64; 2], gain: f64) -> EnsembleRecord {
    EnsembleRecord {
        iteration_index: iteration,
        parameters: Arc::new(ModelParameters {
            baseline_means: vec![1.5 * iteration as f64],
            baseline_std_devs: vec![1.0],
            faraday_gain: gain,
            log_ratios: log_ratios.to_vec(),
            signal_noise: vec![1.0, 0.0, 2.0, 2.0, 2.0],
            data_array: vec![0.0; 3],
            intensity_knots: vec![100.0, 200.0],
            fitted_intensities: vec![0.0; 6],
        }),
    }
}

fn records() -> Vec<EnsembleRecord> {
    vec![
        record(1, [-3.0, -0.1], 0.9),
        record(2, [-2.9, -0.2], 1.0),
        record(3, [-3.1, -0.15], 1.1),
    ]
}

#[test]
fn derived_ratio_is_the_quotient_of_direct_ratios() {
    let method = method(vec![IsotopicRatio::new(0, 1)]);
    let usable = records();
    let stats = StatisticsEngine::new(&method, 25)
        .compute(&block(), &usable)
        .unwrap();

    assert_eq!(stats.ratios.len(), 3);
    let derived = &stats.ratios[2];
    assert!(derived.derived);
    assert_eq!(derived.label, "204Pb/207Pb");
    for (index, record) in usable.iter().enumerate() {
        let expected =
            record.parameters.log_ratios[0].exp() / record.parameters.log_ratios[1].exp();
        assert!((derived.values[index] - expected).abs() < 1e-12);
    }
}

#[test]
fn direct_ratio_series_exponentiates_log_ratios() {
    let method = method(Vec::new());
    let usable = records();
    let stats = StatisticsEngine::new(&method, 25)
        .compute(&block(), &usable)
        .unwrap();

    let direct = &stats.ratios[0];
    assert!(!direct.derived);
    assert_eq!(direct.label, "204Pb/206Pb");
    assert_eq!(direct.inverse, Some(IsotopicRatio::new(2, 0)));
    assert_eq!(direct.log_values, vec![-3.0, -2.9, -3.1]);
    assert!((direct.values[1] - (-2.9f64).exp()).abs() < 1e-15);
    assert!((direct.log_moments.mean + 3.0).abs() < 1e-12);
    assert_eq!(direct.histogram.total(), 3);
    assert!(direct.summary_text.contains('±'));
}

#[test]
fn inverted_direct_ratio_uses_the_reciprocal() {
    let method = method(vec![IsotopicRatio::new(2, 1)]);
    let usable = records();
    let stats = StatisticsEngine::new(&method, 25)
        .compute(&block(), &usable)
        .unwrap();

    let inverted = &stats.ratios[2];
    assert_eq!(inverted.label, "206Pb/207Pb");
    for (value, direct) in inverted.values.iter().zip(&stats.ratios[1].values) {
        assert!((value * direct - 1.0).abs() < 1e-12);
    }
}

#[test]
fn scalar_series_and_curves_follow_the_ensemble() {
    let method = method(Vec::new());
    let usable = records();
    let block = block();
    let stats = StatisticsEngine::new(&method, 25)
        .compute(&block, &usable)
        .unwrap();

    assert_eq!(stats.usable_count, 3);
    assert_eq!(stats.baselines.len(), 1);
    assert_eq!(stats.baselines[0].label, "L1 Baseline");
    assert_eq!(stats.baselines[0].values, vec![1.5, 3.0, 4.5]);
    assert!((stats.gain.moments.mean - 1.0).abs() < 1e-12);
    assert_eq!(stats.noise.len(), 5);
    assert_eq!(stats.knots.len(), 2);
    assert_eq!(stats.knots[0].std_dev, 0.0);

    // Knot means 100 and 200 over six rows, gain mean 1.
    assert_eq!(stats.intensity_curve.x, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert!((stats.intensity_curve.y[0] - 100.0).abs() < 1e-9);
    assert!((stats.intensity_curve.y[5] - 200.0).abs() < 1e-9);
    assert_eq!(stats.cycle_intensity_curve.x, vec![0.0, 3.0]);
    assert!((stats.cycle_intensity_curve.y[1] - stats.intensity_curve.y[3]).abs() < 1e-12);
}

#[test]
fn knot_curve_places_knot_means_on_cycle_starts() {
    let method = method(Vec::new());
    let mut usable = records();
    // Mean gain 2 across the ensemble.
    for (record, gain) in usable.iter_mut().zip([1.0, 2.0, 3.0]) {
        let mut params = (*record.parameters).clone();
        params.faraday_gain = gain;
        record.parameters = Arc::new(params);
    }
    let stats = StatisticsEngine::new(&method, 25)
        .compute(&block(), &usable)
        .unwrap();

    assert_eq!(stats.knot_curve.x, vec![0.0, 3.0]);
    assert_eq!(stats.knot_curve.y, vec![50.0, 100.0]);
    // Interpolated curve at row 3 is not the second knot.
    assert!((stats.cycle_intensity_curve.y[1] - stats.knot_curve.y[1]).abs() > 1.0);
}

#[test]
fn empty_ensemble_is_insufficient() {
    let method = method(Vec::new());
    let err = StatisticsEngine::new(&method, 25)
        .compute(&block(), &[])
        .unwrap_err();
    assert!(matches!(err, IsoError::InsufficientEnsemble(_)));
    assert_eq!(err.info().context.get("block").map(String::as_str), Some("9"));
}

#[test]
fn species_mismatch_is_a_method_error() {
    let method = AnalysisMethod::with_direct_ratios(
        vec![IsotopeSpecies::new("a"), IsotopeSpecies::new("b")],
        Vec::new(),
    )
    .unwrap();
    let err = StatisticsEngine::new(&method, 25)
        .compute(&block(), &records())
        .unwrap_err();
    assert!(matches!(err, IsoError::Method(_)));
    assert_eq!(err.info().code, "species-count");
}

#[test]
fn statistics_serialize_for_the_plotting_collaborator() {
    let method = method(vec![IsotopicRatio::new(0, 1)]);
    let stats = StatisticsEngine::new(&method, 10)
        .compute(&block(), &records())
        .unwrap();
    let json = serde_json::to_string(&stats).unwrap();
    let back: isomc_stats::BlockStatistics = serde_json::from_str(&json).unwrap();
    assert_eq!(back.ratios[2].label, stats.ratios[2].label);
    assert_eq!(back.intensity_curve, stats.intensity_curve);
}
