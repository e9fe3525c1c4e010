use std::sync::Arc;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, IsoError};

/// Category an accumulated reading belongs to within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingCategory {
    /// Off-peak baseline reading on a Faraday detector.
    Baseline,
    /// On-peak reading collected on a Faraday detector.
    OnPeakFaraday,
    /// On-peak reading collected on the photomultiplier.
    OnPeakPhotoMultiplier,
}

/// Single raw intensity accumulation.
///
/// Detector and isotope indices are dense and zero-based; which of them is
/// required depends on the [`ReadingCategory`] of the group holding the reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedReading {
    /// Faraday detector index (baseline and on-peak Faraday readings).
    #[serde(default)]
    pub detector: Option<usize>,
    /// Isotope species index (on-peak readings).
    #[serde(default)]
    pub isotope: Option<usize>,
    /// Row of the knot basis matching the acquisition time.
    pub time_index: usize,
    /// Measured intensity.
    pub intensity: f64,
}

impl AccumulatedReading {
    /// Creates a baseline reading for `detector`.
    pub fn baseline(detector: usize, time_index: usize, intensity: f64) -> Self {
        Self {
            detector: Some(detector),
            isotope: None,
            time_index,
            intensity,
        }
    }

    /// Creates an on-peak Faraday reading.
    pub fn faraday(detector: usize, isotope: usize, time_index: usize, intensity: f64) -> Self {
        Self {
            detector: Some(detector),
            isotope: Some(isotope),
            time_index,
            intensity,
        }
    }

    /// Creates an on-peak photomultiplier reading.
    pub fn photomultiplier(isotope: usize, time_index: usize, intensity: f64) -> Self {
        Self {
            detector: None,
            isotope: Some(isotope),
            time_index,
            intensity,
        }
    }
}

/// Raw input for one measurement block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDataSet {
    /// Identifier of the block within the analysis.
    pub block_id: u32,
    /// Number of Faraday detectors in use.
    pub detector_count: usize,
    /// Number of isotope species, ordered by ascending abundance.
    pub isotope_count: usize,
    /// Baseline readings.
    pub baseline: Vec<AccumulatedReading>,
    /// On-peak Faraday readings.
    pub onpeak_faraday: Vec<AccumulatedReading>,
    /// On-peak photomultiplier readings.
    pub onpeak_photomultiplier: Vec<AccumulatedReading>,
    /// Interpolation matrix mapping time index (rows) to knot coefficients (columns).
    pub knot_basis: DMatrix<f64>,
    /// Time indices at which each measurement cycle starts.
    #[serde(default)]
    pub cycle_start_indices: Vec<usize>,
}

impl BlockDataSet {
    /// Number of modeled observations (`dataArray` length).
    pub fn total_observation_count(&self) -> usize {
        self.baseline.len() + self.onpeak_faraday.len() + self.onpeak_photomultiplier.len()
    }

    /// Number of intensity knots.
    pub fn knot_count(&self) -> usize {
        self.knot_basis.ncols()
    }

    /// Number of rows on the observation timebase.
    pub fn timebase_len(&self) -> usize {
        self.knot_basis.nrows()
    }

    /// Iterates readings in `dataArray` order: baseline, Faraday, photomultiplier.
    pub fn observations(&self) -> impl Iterator<Item = (ReadingCategory, &AccumulatedReading)> {
        self.baseline
            .iter()
            .map(|reading| (ReadingCategory::Baseline, reading))
            .chain(
                self.onpeak_faraday
                    .iter()
                    .map(|reading| (ReadingCategory::OnPeakFaraday, reading)),
            )
            .chain(
                self.onpeak_photomultiplier
                    .iter()
                    .map(|reading| (ReadingCategory::OnPeakPhotoMultiplier, reading)),
            )
    }

    /// Observed intensities aligned with the `dataArray` order.
    pub fn observed_intensities(&self) -> Vec<f64> {
        self.observations()
            .map(|(_, reading)| reading.intensity)
            .collect()
    }

    /// Checks every reading against the declared detector and isotope counts.
    pub fn validate_shape(&self) -> Result<(), IsoError> {
        let block = self.block_id;
        if self.detector_count == 0 || self.isotope_count == 0 {
            return Err(shape_error(
                block,
                "empty-declaration",
                "at least one detector and one isotope must be declared",
            ));
        }
        if self.knot_basis.ncols() == 0 || self.knot_basis.nrows() == 0 {
            return Err(shape_error(
                block,
                "empty-knot-basis",
                "knot basis has no rows or columns",
            ));
        }
        for (category, reading) in self.observations() {
            let needs_detector = category != ReadingCategory::OnPeakPhotoMultiplier;
            let needs_isotope = category != ReadingCategory::Baseline;
            match reading.detector {
                Some(detector) if detector >= self.detector_count => {
                    return Err(IsoError::DataShape(
                        shape_info(block, "detector-out-of-range", "detector index exceeds declaration")
                            .with_context("detector", detector)
                            .with_context("detector_count", self.detector_count),
                    ));
                }
                None if needs_detector => {
                    return Err(IsoError::DataShape(
                        shape_info(block, "missing-detector", "reading has no detector index")
                            .with_context("category", format!("{category:?}")),
                    ));
                }
                _ => {}
            }
            match reading.isotope {
                Some(isotope) if isotope >= self.isotope_count => {
                    return Err(IsoError::DataShape(
                        shape_info(block, "isotope-out-of-range", "isotope index exceeds declaration")
                            .with_context("isotope", isotope)
                            .with_context("isotope_count", self.isotope_count),
                    ));
                }
                None if needs_isotope => {
                    return Err(IsoError::DataShape(
                        shape_info(block, "missing-isotope", "reading has no isotope index")
                            .with_context("category", format!("{category:?}")),
                    ));
                }
                _ => {}
            }
            if needs_isotope && reading.time_index >= self.timebase_len() {
                return Err(IsoError::DataShape(
                    shape_info(block, "time-index-out-of-range", "time index beyond knot basis rows")
                        .with_context("time_index", reading.time_index)
                        .with_context("timebase_len", self.timebase_len()),
                ));
            }
        }
        if let Some(&start) = self
            .cycle_start_indices
            .iter()
            .find(|&&start| start >= self.timebase_len())
        {
            return Err(IsoError::DataShape(
                shape_info(block, "cycle-start-out-of-range", "cycle start beyond knot basis rows")
                    .with_context("cycle_start", start),
            ));
        }
        Ok(())
    }
}

fn shape_info(block_id: u32, code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message).with_context("block", block_id)
}

fn shape_error(block_id: u32, code: &str, message: &str) -> IsoError {
    IsoError::DataShape(shape_info(block_id, code, message))
}

/// Immutable snapshot of the model state for one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Baseline mean per Faraday detector.
    pub baseline_means: Vec<f64>,
    /// Baseline standard deviation per Faraday detector.
    pub baseline_std_devs: Vec<f64>,
    /// Photomultiplier / Faraday gain.
    pub faraday_gain: f64,
    /// Natural log ratio of each non-reference isotope to the reference isotope.
    pub log_ratios: Vec<f64>,
    /// Noise hyper-parameters: one slot per Faraday detector, one photomultiplier
    /// slot, then one shot-noise slot per isotope.
    pub signal_noise: Vec<f64>,
    /// Modeled signal aligned with the raw observation order.
    pub data_array: Vec<f64>,
    /// Intensity knot coefficients.
    pub intensity_knots: Vec<f64>,
    /// Knot basis times knot coefficients, one value per timebase row.
    pub fitted_intensities: Vec<f64>,
}

impl ModelParameters {
    /// Number of Faraday detectors described by the snapshot.
    pub fn detector_count(&self) -> usize {
        self.baseline_means.len()
    }

    /// Number of isotope species, including the reference.
    pub fn isotope_count(&self) -> usize {
        self.log_ratios.len() + 1
    }

    /// Index of the reference (most abundant, last) isotope.
    pub fn reference_isotope(&self) -> usize {
        self.log_ratios.len()
    }

    /// Abundance factor `exp(logRatio)` of `isotope`; the reference maps to 1.
    pub fn ratio_factor(&self, isotope: usize) -> f64 {
        self.log_ratios
            .get(isotope)
            .map(|log_ratio| log_ratio.exp())
            .unwrap_or(1.0)
    }

    /// Noise slot of the photomultiplier channel.
    pub fn photomultiplier_noise_slot(&self) -> usize {
        self.detector_count()
    }

    /// Noise slot of an isotope's shot-noise term.
    pub fn isotope_noise_slot(&self, isotope: usize) -> usize {
        self.detector_count() + 1 + isotope
    }
}

/// Accepted or retained model snapshot stored in a block ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleRecord {
    /// One-based iteration that produced the record.
    pub iteration_index: usize,
    /// Shared snapshot; retained iterations point at the same allocation.
    pub parameters: Arc<ModelParameters>,
}
