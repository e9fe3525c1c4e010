use isomc_core::{
    AnalysisMethod, BlockDataSet, EnsembleRecord, ErrorInfo, IsoError, IsotopicRatio,
};
use isomc_linalg::{describe, Moments};
use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::histogram::Histogram;

/// Ensemble series of one isotopic ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSeries {
    /// Ratio described by the series.
    pub ratio: IsotopicRatio,
    /// Display label, e.g. `iso0/iso2`.
    pub label: String,
    /// Inverse partner from the ratio pair table, for flipping orientation.
    pub inverse: Option<IsotopicRatio>,
    /// Whether the ratio was derived rather than sampled directly.
    pub derived: bool,
    /// Natural-log ratio per usable record.
    pub log_values: Vec<f64>,
    /// Ratio value per usable record.
    pub values: Vec<f64>,
    /// Mean and standard deviation of the log series.
    pub log_moments: Moments,
    /// Mean and standard deviation of the ratio series.
    pub moments: Moments,
    /// Histogram of the ratio values.
    pub histogram: Histogram,
    /// `mean ± stddev` of the ratio values.
    pub summary_text: String,
}

/// Ensemble series of a scalar quantity (baseline, gain, noise slot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSeries {
    /// Display label.
    pub label: String,
    /// Value per usable record.
    pub values: Vec<f64>,
    /// Mean and standard deviation.
    pub moments: Moments,
    /// Histogram of the values.
    pub histogram: Histogram,
    /// `mean ± stddev`.
    pub summary_text: String,
}

/// Coordinate pairs of an intensity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityCurve {
    /// Display label.
    pub label: String,
    /// Time indices.
    pub x: Vec<f64>,
    /// Gain-normalised mean intensity at each time index.
    pub y: Vec<f64>,
}

impl IntensityCurve {
    /// `(x, y)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}

/// Everything the visualization collaborator needs for one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStatistics {
    /// Block the statistics belong to.
    pub block_id: u32,
    /// Number of records summarised.
    pub usable_count: usize,
    /// Direct ratios followed by derived ratios, in method order.
    pub ratios: Vec<RatioSeries>,
    /// Baseline series per Faraday detector.
    pub baselines: Vec<ScalarSeries>,
    /// Faraday gain series.
    pub gain: ScalarSeries,
    /// Mean and standard deviation per intensity knot.
    pub knots: Vec<Moments>,
    /// Series per noise hyper-parameter slot.
    pub noise: Vec<ScalarSeries>,
    /// Mean intensity over the whole timebase.
    pub intensity_curve: IntensityCurve,
    /// Mean intensity at the cycle-start indices.
    pub cycle_intensity_curve: IntensityCurve,
    /// Gain-normalised knot means, knot `i` placed at the `i`-th cycle start.
    pub knot_curve: IntensityCurve,
}

/// Summarises usable ensemble records for an analysis method.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsEngine<'a> {
    method: &'a AnalysisMethod,
    histogram_bins: usize,
}

impl<'a> StatisticsEngine<'a> {
    /// Creates an engine producing histograms with `histogram_bins` bins.
    pub fn new(method: &'a AnalysisMethod, histogram_bins: usize) -> Self {
        Self {
            method,
            histogram_bins,
        }
    }

    /// Computes the block statistics from the post burn-in records.
    ///
    /// Fails with [`IsoError::InsufficientEnsemble`] when `usable` is empty.
    pub fn compute(
        &self,
        block: &BlockDataSet,
        usable: &[EnsembleRecord],
    ) -> Result<BlockStatistics, IsoError> {
        if usable.is_empty() {
            return Err(IsoError::InsufficientEnsemble(
                ErrorInfo::new("empty-ensemble", "no records after burn-in")
                    .with_context("block", block.block_id)
                    .with_hint("run more iterations or lower the burn-in"),
            ));
        }
        self.check_method(block)?;
        debug!(
            "block {}: summarising {} ensemble records",
            block.block_id,
            usable.len()
        );

        let ratios = self.ratio_series(usable)?;

        let detector_names = self.method.faraday_detectors();
        let baselines = (0..block.detector_count)
            .map(|detector| {
                let label = detector_names
                    .get(detector)
                    .cloned()
                    .unwrap_or_else(|| format!("F{detector}"));
                self.scalar_series(
                    format!("{label} Baseline"),
                    usable
                        .iter()
                        .map(|record| record.parameters.baseline_means[detector])
                        .collect(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let gain = self.scalar_series(
            "Daly/Faraday Gain".to_string(),
            usable
                .iter()
                .map(|record| record.parameters.faraday_gain)
                .collect(),
        )?;

        let knot_count = usable[0].parameters.intensity_knots.len();
        let knots = (0..knot_count)
            .map(|knot| {
                let values: Vec<f64> = usable
                    .iter()
                    .map(|record| record.parameters.intensity_knots[knot])
                    .collect();
                moments_of(&values)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let slot_count = usable[0].parameters.signal_noise.len();
        let noise = (0..slot_count)
            .map(|slot| {
                self.scalar_series(
                    noise_label(slot, block.detector_count),
                    usable
                        .iter()
                        .map(|record| record.parameters.signal_noise[slot])
                        .collect(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (intensity_curve, cycle_intensity_curve, knot_curve) =
            intensity_curves(block, &knots, gain.moments.mean)?;

        Ok(BlockStatistics {
            block_id: block.block_id,
            usable_count: usable.len(),
            ratios,
            baselines,
            gain,
            knots,
            noise,
            intensity_curve,
            cycle_intensity_curve,
            knot_curve,
        })
    }

    fn check_method(&self, block: &BlockDataSet) -> Result<(), IsoError> {
        if self.method.species().len() != block.isotope_count {
            return Err(IsoError::Method(
                ErrorInfo::new("species-count", "method species differ from block isotopes")
                    .with_context("block", block.block_id)
                    .with_context("species", self.method.species().len())
                    .with_context("isotopes", block.isotope_count),
            ));
        }
        let detectors = self.method.faraday_detectors().len();
        if detectors != 0 && detectors != block.detector_count {
            return Err(IsoError::Method(
                ErrorInfo::new("detector-count", "method detectors differ from block detectors")
                    .with_context("block", block.block_id)
                    .with_context("detectors", detectors)
                    .with_context("block_detectors", block.detector_count),
            ));
        }
        Ok(())
    }

    fn ratio_series(&self, usable: &[EnsembleRecord]) -> Result<Vec<RatioSeries>, IsoError> {
        let direct_ratios = self.method.direct_ratios();
        let mut series: Vec<RatioSeries> = Vec::with_capacity(
            direct_ratios.len() + self.method.derived_ratios().len(),
        );
        for ratio in direct_ratios {
            let log_values: Vec<f64> = usable
                .iter()
                .map(|record| record.parameters.log_ratios[ratio.numerator])
                .collect();
            series.push(self.ratio(*ratio, false, log_values)?);
        }
        for ratio in self.method.derived_ratios() {
            let log_values: Vec<f64> = match self.inverted_direct(ratio) {
                Some(direct) => series[direct].log_values.iter().map(|v| -v).collect(),
                None => usable
                    .iter()
                    .map(|record| {
                        let params = &record.parameters;
                        (params.ratio_factor(ratio.numerator)
                            / params.ratio_factor(ratio.denominator))
                        .ln()
                    })
                    .collect(),
            };
            series.push(self.ratio(*ratio, true, log_values)?);
        }
        Ok(series)
    }

    /// Index of the direct ratio `ratio` is the inverse of, if any.
    fn inverted_direct(&self, ratio: &IsotopicRatio) -> Option<usize> {
        self.method
            .pairs()
            .lookup(ratio)
            .filter(|entry| entry.inverted && entry.index < self.method.direct_ratios().len())
            .map(|entry| entry.index)
    }

    fn ratio(
        &self,
        ratio: IsotopicRatio,
        derived: bool,
        log_values: Vec<f64>,
    ) -> Result<RatioSeries, IsoError> {
        let values: Vec<f64> = log_values.iter().map(|v| v.exp()).collect();
        let moments = moments_of(&values)?;
        Ok(RatioSeries {
            label: ratio.label(self.method.species()),
            inverse: self.method.pairs().partner(&ratio),
            derived,
            log_moments: moments_of(&log_values)?,
            histogram: Histogram::from_values(&values, self.histogram_bins),
            summary_text: summary_text(&moments),
            moments,
            ratio,
            log_values,
            values,
        })
    }

    fn scalar_series(&self, label: String, values: Vec<f64>) -> Result<ScalarSeries, IsoError> {
        let moments = moments_of(&values)?;
        Ok(ScalarSeries {
            label,
            histogram: Histogram::from_values(&values, self.histogram_bins),
            summary_text: summary_text(&moments),
            moments,
            values,
        })
    }
}

fn moments_of(values: &[f64]) -> Result<Moments, IsoError> {
    describe(values).ok_or_else(|| {
        IsoError::InsufficientEnsemble(ErrorInfo::new("empty-series", "series has no values"))
    })
}

/// `mean ± stddev` in scientific notation.
pub fn summary_text(moments: &Moments) -> String {
    format!("{:.6e} ± {:.3e}", moments.mean, moments.std_dev)
}

fn noise_label(slot: usize, detector_count: usize) -> String {
    if slot < detector_count {
        format!("noise F{slot}")
    } else if slot == detector_count {
        "noise PM".to_string()
    } else {
        format!("noise iso{}", slot - detector_count - 1)
    }
}

fn intensity_curves(
    block: &BlockDataSet,
    knots: &[Moments],
    mean_gain: f64,
) -> Result<(IntensityCurve, IntensityCurve, IntensityCurve), IsoError> {
    if knots.len() != block.knot_count() {
        return Err(IsoError::DataShape(
            ErrorInfo::new("knot-count", "ensemble knots differ from the block basis")
                .with_context("block", block.block_id)
                .with_context("knots", knots.len())
                .with_context("basis_columns", block.knot_count()),
        ));
    }
    let means = DVector::from_iterator(knots.len(), knots.iter().map(|m| m.mean));
    let curve = (&block.knot_basis * means) / mean_gain;
    let full = IntensityCurve {
        label: "Mean Intensity".to_string(),
        x: (0..curve.len()).map(|t| t as f64).collect(),
        y: curve.iter().copied().collect(),
    };
    let cycles = IntensityCurve {
        label: "Mean Intensity w/ Knots".to_string(),
        x: block
            .cycle_start_indices
            .iter()
            .map(|&t| t as f64)
            .collect(),
        y: block
            .cycle_start_indices
            .iter()
            .map(|&t| curve.get(t).copied().unwrap_or(f64::NAN))
            .collect(),
    };
    // Pairs stop at whichever of knots or cycle starts runs out first.
    let (x, y): (Vec<f64>, Vec<f64>) = block
        .cycle_start_indices
        .iter()
        .zip(knots)
        .map(|(&t, knot)| (t as f64, knot.mean / mean_gain))
        .unzip();
    let knot_curve = IntensityCurve {
        label: "Knot Means".to_string(),
        x,
        y,
    };
    Ok((full, cycles, knot_curve))
}
