use std::sync::Arc;

use isomc_core::{IsoError, ModelParameters};
use isomc_mcmc::EnsembleStore;

fn params(gain: f64) -> Arc<ModelParameters> {
    Arc::new(ModelParameters {
        baseline_means: vec![0.0],
        baseline_std_devs: vec![1.0],
        faraday_gain: gain,
        log_ratios: vec![-1.0],
        signal_noise: vec![1.0, 0.0, 11.0, 11.0],
        data_array: Vec::new(),
        intensity_knots: vec![1.0],
        fitted_intensities: Vec::new(),
    })
}

#[test]
fn records_must_arrive_in_iteration_order() {
    let mut store = EnsembleStore::new();
    store.push_state(1, params(1.0)).unwrap();
    store.push_state(2, params(1.1)).unwrap();
    let err = store.push_state(2, params(1.2)).unwrap_err();
    assert!(matches!(err, IsoError::Ensemble(_)));
    assert_eq!(err.info().code, "out-of-order-record");
    assert_eq!(store.len(), 2);
}

#[test]
fn retained_states_share_one_snapshot() {
    let mut store = EnsembleStore::with_capacity(3);
    let shared = params(0.9);
    store.push_state(1, Arc::clone(&shared)).unwrap();
    store.push_state(2, Arc::clone(&shared)).unwrap();
    let records = store.snapshot();
    assert!(Arc::ptr_eq(&records[0].parameters, &records[1].parameters));
}

#[test]
fn burn_in_partitions_the_store() {
    let mut store = EnsembleStore::new();
    for iteration in 1..=10 {
        store.push_state(iteration, params(iteration as f64)).unwrap();
    }
    store.set_burn_in(4).unwrap();
    assert_eq!(store.usable_count(), 6);
    assert_eq!(store.usable()[0].iteration_index, 5);

    store.set_burn_in(10).unwrap();
    assert!(store.usable().is_empty());
    assert_eq!(
        store.set_burn_in(11).unwrap_err().info().code,
        "burn-in-exceeds-ensemble"
    );

    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.burn_in(), 0);
}
