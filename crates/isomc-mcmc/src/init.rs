//! Closed-form starting estimate for a block.

use isomc_core::{AccumulatedReading, BlockDataSet, ErrorInfo, IsoError, ModelParameters};
use isomc_linalg::{describe, least_squares};
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::model::ObservationModel;

/// Per-detector baseline mean and sample standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStatistics {
    /// Mean baseline reading per detector.
    pub means: Vec<f64>,
    /// Sample standard deviation per detector.
    pub std_devs: Vec<f64>,
}

impl BaselineStatistics {
    /// Groups baseline readings by detector and summarises each group.
    ///
    /// Every detector in `0..detector_count` must have at least one reading.
    pub fn from_readings(
        readings: &[AccumulatedReading],
        detector_count: usize,
    ) -> Result<Self, IsoError> {
        let groups = group_by(readings, detector_count, |reading| reading.detector, |r| r.intensity)?;
        let mut means = Vec::with_capacity(detector_count);
        let mut std_devs = Vec::with_capacity(detector_count);
        for (detector, values) in groups.iter().enumerate() {
            let moments = describe(values).ok_or_else(|| {
                IsoError::DataShape(
                    ErrorInfo::new("detector-without-baseline", "detector has no baseline readings")
                        .with_context("detector", detector),
                )
            })?;
            means.push(moments.mean);
            std_devs.push(moments.std_dev);
        }
        Ok(Self { means, std_devs })
    }
}

/// Initial parameters plus the intermediate group statistics they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialEstimate {
    /// Starting model state.
    pub parameters: ModelParameters,
    /// Baseline-corrected Faraday mean per isotope, when measured.
    pub faraday_means: Vec<Option<f64>>,
    /// Photomultiplier mean per isotope.
    pub photomultiplier_means: Vec<f64>,
    /// Isotope with the largest photomultiplier mean; used for the gain.
    pub gain_isotope: usize,
    /// Whether the largest photomultiplier mean sits on the last (reference) species.
    pub reference_convention_holds: bool,
}

impl InitialEstimate {
    /// One-line description for block logs.
    pub fn summary_line(&self) -> String {
        format!(
            "initial estimate: gain {:.6e} from isotope {}, log-ratios {:?}, {} knots, reference convention {}",
            self.parameters.faraday_gain,
            self.gain_isotope,
            self.parameters.log_ratios,
            self.parameters.intensity_knots.len(),
            if self.reference_convention_holds { "holds" } else { "violated" },
        )
    }
}

/// Computes the starting parameter estimate for `block`.
///
/// `isotope_noise` seeds every per-isotope shot-noise slot.
pub fn initialize(block: &BlockDataSet, isotope_noise: f64) -> Result<InitialEstimate, IsoError> {
    block.validate_shape()?;
    let detectors = block.detector_count;
    let isotopes = block.isotope_count;

    let baseline = BaselineStatistics::from_readings(&block.baseline, detectors)?;

    let faraday_groups = group_by(&block.onpeak_faraday, isotopes, |r| r.isotope, |r| {
        // Readings were shape-checked, so the detector is present and in range.
        r.intensity - r.detector.map(|d| baseline.means[d]).unwrap_or(0.0)
    })?;
    let faraday_means: Vec<Option<f64>> = faraday_groups
        .iter()
        .map(|values| describe(values).map(|m| m.mean))
        .collect();

    let pm_groups = group_by(&block.onpeak_photomultiplier, isotopes, |r| r.isotope, |r| r.intensity)?;
    let mut photomultiplier_means = Vec::with_capacity(isotopes);
    for (isotope, values) in pm_groups.iter().enumerate() {
        let moments = describe(values).ok_or_else(|| {
            IsoError::DataShape(
                block_info(
                    block,
                    "isotope-without-photomultiplier",
                    "isotope has no photomultiplier readings",
                )
                .with_context("isotope", isotope),
            )
        })?;
        if moments.mean <= 0.0 {
            return Err(IsoError::Numerical(
                block_info(block, "non-positive-mean", "photomultiplier mean must be positive")
                    .with_context("isotope", isotope)
                    .with_context("mean", moments.mean),
            ));
        }
        photomultiplier_means.push(moments.mean);
    }

    let gain_isotope = argmax(&photomultiplier_means);
    let reference = isotopes - 1;
    let reference_convention_holds = gain_isotope == reference;
    if !reference_convention_holds {
        warn!(
            "block {}: largest photomultiplier mean is on isotope {} but the reference species is {}",
            block.block_id, gain_isotope, reference
        );
    }
    let faraday_at_gain = faraday_means[gain_isotope].ok_or_else(|| {
        IsoError::DataShape(
            block_info(
                block,
                "gain-isotope-without-faraday",
                "isotope used for the gain has no Faraday readings",
            )
            .with_context("isotope", gain_isotope),
        )
    })?;
    if faraday_at_gain == 0.0 {
        return Err(IsoError::Numerical(
            block_info(block, "zero-faraday-mean", "baseline-corrected Faraday mean is zero")
                .with_context("isotope", gain_isotope),
        ));
    }
    let faraday_gain = photomultiplier_means[gain_isotope] / faraday_at_gain;

    let log_ratios: Vec<f64> = photomultiplier_means[..reference]
        .iter()
        .map(|mean| (mean / photomultiplier_means[reference]).ln())
        .collect();

    let intensity_knots = fit_knots(block, &log_ratios)?;

    let mut signal_noise = baseline.std_devs.clone();
    signal_noise.push(0.0);
    signal_noise.extend(std::iter::repeat(isotope_noise).take(isotopes));

    let mut parameters = ModelParameters {
        baseline_means: baseline.means,
        baseline_std_devs: baseline.std_devs,
        faraday_gain,
        log_ratios,
        signal_noise,
        data_array: Vec::new(),
        intensity_knots,
        fitted_intensities: Vec::new(),
    };
    ObservationModel::new(block).refresh(&mut parameters);

    let estimate = InitialEstimate {
        parameters,
        faraday_means,
        photomultiplier_means,
        gain_isotope,
        reference_convention_holds,
    };
    info!("block {}: {}", block.block_id, estimate.summary_line());
    Ok(estimate)
}

/// Least-squares knot fit of the de-ratioed photomultiplier series.
fn fit_knots(block: &BlockDataSet, log_ratios: &[f64]) -> Result<Vec<f64>, IsoError> {
    let mut readings: Vec<&AccumulatedReading> = block.onpeak_photomultiplier.iter().collect();
    readings.sort_by_key(|reading| reading.time_index);

    let knot_count = block.knot_count();
    let mut design = DMatrix::zeros(readings.len(), knot_count);
    let mut deratioed = DVector::zeros(readings.len());
    for (row, reading) in readings.iter().enumerate() {
        let factor = reading
            .isotope
            .and_then(|isotope| log_ratios.get(isotope))
            .map(|log_ratio| log_ratio.exp())
            .unwrap_or(1.0);
        deratioed[row] = reading.intensity / factor;
        design
            .row_mut(row)
            .copy_from(&block.knot_basis.row(reading.time_index));
    }
    let knots = least_squares(&design, &deratioed).map_err(|err| match err {
        IsoError::Numerical(info) => IsoError::Numerical(info.with_context("block", block.block_id)),
        other => other,
    })?;
    Ok(knots.iter().copied().collect())
}

fn block_info(block: &BlockDataSet, code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message).with_context("block", block.block_id)
}

fn group_by<K, V>(
    readings: &[AccumulatedReading],
    slots: usize,
    key: K,
    value: V,
) -> Result<Vec<Vec<f64>>, IsoError>
where
    K: Fn(&AccumulatedReading) -> Option<usize>,
    V: Fn(&AccumulatedReading) -> f64,
{
    let mut groups = vec![Vec::new(); slots];
    for reading in readings {
        match key(reading) {
            Some(slot) if slot < slots => groups[slot].push(value(reading)),
            other => {
                return Err(IsoError::DataShape(
                    ErrorInfo::new("ungroupable-reading", "reading index missing or out of range")
                        .with_context("index", format!("{other:?}"))
                        .with_context("slots", slots),
                ))
            }
        }
    }
    Ok(groups)
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best, best_value)
            }
        })
        .0
}
