use isomc_core::{AccumulatedReading, BlockDataSet, IsoError, ReadingCategory};
use nalgebra::DMatrix;

fn small_block() -> BlockDataSet {
    BlockDataSet {
        block_id: 4,
        detector_count: 2,
        isotope_count: 2,
        baseline: vec![
            AccumulatedReading::baseline(0, 0, 1.0),
            AccumulatedReading::baseline(1, 0, 2.0),
        ],
        onpeak_faraday: vec![AccumulatedReading::faraday(1, 1, 0, 30.0)],
        onpeak_photomultiplier: vec![
            AccumulatedReading::photomultiplier(0, 1, 10.0),
            AccumulatedReading::photomultiplier(1, 2, 20.0),
        ],
        knot_basis: DMatrix::from_element(3, 2, 0.5),
        cycle_start_indices: vec![0, 2],
    }
}

#[test]
fn observations_follow_data_array_order() {
    let block = small_block();
    let categories: Vec<ReadingCategory> = block.observations().map(|(c, _)| c).collect();
    assert_eq!(
        categories,
        vec![
            ReadingCategory::Baseline,
            ReadingCategory::Baseline,
            ReadingCategory::OnPeakFaraday,
            ReadingCategory::OnPeakPhotoMultiplier,
            ReadingCategory::OnPeakPhotoMultiplier,
        ]
    );
    assert_eq!(block.observed_intensities(), vec![1.0, 2.0, 30.0, 10.0, 20.0]);
    assert_eq!(block.total_observation_count(), 5);
    assert!(block.validate_shape().is_ok());
}

#[test]
fn detector_beyond_declaration_is_a_shape_error() {
    let mut block = small_block();
    block.baseline.push(AccumulatedReading::baseline(2, 0, 1.0));
    let err = block.validate_shape().unwrap_err();
    assert!(matches!(err, IsoError::DataShape(_)));
    assert_eq!(err.info().code, "detector-out-of-range");
    assert_eq!(err.info().context.get("block").map(String::as_str), Some("4"));
}

#[test]
fn photomultiplier_reading_needs_isotope() {
    let mut block = small_block();
    block.onpeak_photomultiplier[0].isotope = None;
    let err = block.validate_shape().unwrap_err();
    assert_eq!(err.info().code, "missing-isotope");
}

#[test]
fn time_index_beyond_basis_is_rejected() {
    let mut block = small_block();
    block.onpeak_photomultiplier[1].time_index = 3;
    let err = block.validate_shape().unwrap_err();
    assert_eq!(err.info().code, "time-index-out-of-range");
}
