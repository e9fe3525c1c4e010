//! Forward model shared by the initializer and the sampler: modeled signal,
//! parameter-vector layout and the Gaussian log-likelihood.

use std::ops::Range;

use isomc_core::{BlockDataSet, ModelParameters, ReadingCategory};
use nalgebra::{DMatrix, DVector};

use crate::config::{Interval, PriorBounds};

/// Variance floor keeping the likelihood finite for noiseless channels.
const VARIANCE_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
struct Observation {
    category: ReadingCategory,
    detector: usize,
    isotope: usize,
    time_index: usize,
    intensity: f64,
}

/// Flattened, block-owned view of the observations and knot basis.
#[derive(Debug, Clone)]
pub struct ObservationModel {
    observations: Vec<Observation>,
    knot_basis: DMatrix<f64>,
    detector_count: usize,
    isotope_count: usize,
}

impl ObservationModel {
    /// Builds the model from a shape-validated block.
    pub fn new(block: &BlockDataSet) -> Self {
        let observations = block
            .observations()
            .map(|(category, reading)| Observation {
                category,
                detector: reading.detector.unwrap_or(block.detector_count),
                isotope: reading.isotope.unwrap_or(0),
                time_index: reading.time_index,
                intensity: reading.intensity,
            })
            .collect();
        Self {
            observations,
            knot_basis: block.knot_basis.clone(),
            detector_count: block.detector_count,
            isotope_count: block.isotope_count,
        }
    }

    /// Number of observations (`dataArray` length).
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the block holds no observation at all.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Knot basis times knot coefficients over the whole timebase.
    pub fn fitted_intensities(&self, knots: &[f64]) -> Vec<f64> {
        let knots = DVector::from_column_slice(knots);
        (&self.knot_basis * knots).iter().copied().collect()
    }

    /// Modeled signal for every observation, in raw observation order.
    pub fn data_array(&self, params: &ModelParameters, fitted: &[f64]) -> Vec<f64> {
        self.observations
            .iter()
            .map(|obs| self.predict(obs, params, fitted))
            .collect()
    }

    /// Recomputes `fitted_intensities` and `data_array` from the other fields.
    pub fn refresh(&self, params: &mut ModelParameters) {
        params.fitted_intensities = self.fitted_intensities(&params.intensity_knots);
        params.data_array = self.data_array(params, &params.fitted_intensities);
    }

    fn predict(&self, obs: &Observation, params: &ModelParameters, fitted: &[f64]) -> f64 {
        let signal = fitted.get(obs.time_index).copied().unwrap_or(0.0);
        match obs.category {
            ReadingCategory::Baseline => params.baseline_means[obs.detector],
            ReadingCategory::OnPeakFaraday => {
                params.ratio_factor(obs.isotope) / params.faraday_gain * signal
                    + params.baseline_means[obs.detector]
            }
            ReadingCategory::OnPeakPhotoMultiplier => params.ratio_factor(obs.isotope) * signal,
        }
    }

    /// Gaussian log-likelihood of the observations under `params`.
    ///
    /// Baseline variance is the detector noise squared. On-peak variance adds
    /// the isotope shot-noise term times the baseline-free modeled signal; the
    /// photomultiplier uses its own slot in place of a detector.
    pub fn log_likelihood(&self, params: &ModelParameters) -> f64 {
        let pm_slot = self.detector_count;
        let mut total = 0.0;
        for (obs, modeled) in self.observations.iter().zip(&params.data_array) {
            let variance = match obs.category {
                ReadingCategory::Baseline => params.signal_noise[obs.detector].powi(2),
                ReadingCategory::OnPeakFaraday => {
                    let ion_signal = modeled - params.baseline_means[obs.detector];
                    params.signal_noise[obs.detector].powi(2)
                        + params.signal_noise[pm_slot + 1 + obs.isotope] * ion_signal.max(0.0)
                }
                ReadingCategory::OnPeakPhotoMultiplier => {
                    params.signal_noise[pm_slot].powi(2)
                        + params.signal_noise[pm_slot + 1 + obs.isotope] * modeled.max(0.0)
                }
            }
            .max(VARIANCE_FLOOR);
            let residual = obs.intensity - modeled;
            total += residual * residual / variance + variance.ln();
        }
        -0.5 * total
    }

    /// Number of Faraday detectors.
    pub fn detector_count(&self) -> usize {
        self.detector_count
    }

    /// Number of isotope species.
    pub fn isotope_count(&self) -> usize {
        self.isotope_count
    }

    /// Number of intensity knots.
    pub fn knot_count(&self) -> usize {
        self.knot_basis.ncols()
    }
}

/// Log prior: zero inside every box, negative infinity outside.
pub fn log_prior(params: &ModelParameters, priors: &PriorBounds) -> f64 {
    let inside = params.log_ratios.iter().all(|v| priors.log_ratio.contains(*v))
        && params.baseline_means.iter().all(|v| priors.baseline.contains(*v))
        && priors.gain.contains(params.faraday_gain)
        && params.intensity_knots.iter().all(|v| priors.intensity.contains(*v))
        && params.signal_noise.iter().all(|v| priors.noise.contains(*v));
    if inside {
        0.0
    } else {
        f64::NEG_INFINITY
    }
}

/// Clamps every sampled quantity into its prior interval.
///
/// Returns `true` when anything moved; derived fields are left stale and must
/// be refreshed by the caller.
pub fn project_into_support(params: &mut ModelParameters, priors: &PriorBounds) -> bool {
    let mut moved = false;
    let mut clamp = |value: &mut f64, interval: &Interval| {
        let projected = interval.clamp(*value);
        if projected != *value {
            *value = projected;
            moved = true;
        }
    };
    for value in &mut params.log_ratios {
        clamp(value, &priors.log_ratio);
    }
    for value in &mut params.baseline_means {
        clamp(value, &priors.baseline);
    }
    clamp(&mut params.faraday_gain, &priors.gain);
    for value in &mut params.intensity_knots {
        clamp(value, &priors.intensity);
    }
    for value in &mut params.signal_noise {
        clamp(value, &priors.noise);
    }
    moved
}

/// Position of every sampled quantity in the flat parameter vector
/// `[log-ratios, knots, baselines, gain]` tracked by the running covariance.
///
/// Noise hyper-parameters are not part of the vector; their proposals are
/// scaled by the per-operation step scale only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    log_ratios: usize,
    knots: usize,
    detectors: usize,
}

impl ParameterLayout {
    /// Layout for a block of the given dimensions.
    pub fn new(isotope_count: usize, knot_count: usize, detector_count: usize) -> Self {
        Self {
            log_ratios: isotope_count.saturating_sub(1),
            knots: knot_count,
            detectors: detector_count,
        }
    }

    /// Total vector length.
    pub fn len(&self) -> usize {
        self.log_ratios + self.knots + self.detectors + 1
    }

    /// Always false: the gain slot is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Slice holding the log-ratios.
    pub fn log_ratio_range(&self) -> Range<usize> {
        0..self.log_ratios
    }

    /// Slice holding the intensity knots.
    pub fn knot_range(&self) -> Range<usize> {
        self.log_ratios..self.log_ratios + self.knots
    }

    /// Slice holding the detector baselines.
    pub fn baseline_range(&self) -> Range<usize> {
        let start = self.log_ratios + self.knots;
        start..start + self.detectors
    }

    /// Position of the gain.
    pub fn gain_index(&self) -> usize {
        self.log_ratios + self.knots + self.detectors
    }

    /// Flattens the sampled quantities of `params`.
    pub fn to_vector(&self, params: &ModelParameters) -> Vec<f64> {
        let mut vector = Vec::with_capacity(self.len());
        vector.extend_from_slice(&params.log_ratios);
        vector.extend_from_slice(&params.intensity_knots);
        vector.extend_from_slice(&params.baseline_means);
        vector.push(params.faraday_gain);
        vector
    }
}
