use isomc_core::{
    AccumulatedReading, AnalysisMethod, BlockDataSet, ErrorInfo, IsoError, IsotopeSpecies,
    IsotopicRatio, RngHandle,
};
use isomc_linalg::linear_knot_basis;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Known truth from which a block data set is synthesised.
///
/// Each cycle measures every isotope once, on the photomultiplier and on
/// Faraday detector `isotope % detector_count`, so the timebase has
/// `cycles * isotope_count` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticBlockSpec {
    /// Identifier of the generated block.
    pub block_id: u32,
    /// True baseline per Faraday detector.
    pub baseline_means: Vec<f64>,
    /// Baseline noise standard deviation per detector.
    pub baseline_noise: Vec<f64>,
    /// Abundance of each isotope relative to the last (reference) isotope.
    pub abundances: Vec<f64>,
    /// Photomultiplier / Faraday gain.
    pub gain: f64,
    /// Reference-isotope intensity at the first time index.
    pub intensity_start: f64,
    /// Reference-isotope intensity at the last time index.
    pub intensity_end: f64,
    /// Variance added per unit of ion signal.
    pub shot_noise: f64,
    /// Number of measurement cycles.
    pub cycles: usize,
    /// Number of knots in the generated basis.
    pub knot_count: usize,
    /// Baseline readings per detector.
    pub baseline_readings: usize,
}

impl Default for SyntheticBlockSpec {
    fn default() -> Self {
        Self {
            block_id: 1,
            baseline_means: vec![-120.0, 250.0],
            baseline_noise: vec![20.0, 25.0],
            abundances: vec![0.05, 0.4, 1.0],
            gain: 0.9,
            intensity_start: 2.0e5,
            intensity_end: 1.6e5,
            shot_noise: 1.0,
            cycles: 40,
            knot_count: 5,
            baseline_readings: 60,
        }
    }
}

impl SyntheticBlockSpec {
    /// Number of isotope species.
    pub fn isotope_count(&self) -> usize {
        self.abundances.len()
    }

    /// Number of Faraday detectors.
    pub fn detector_count(&self) -> usize {
        self.baseline_means.len()
    }

    /// True log-ratios of the non-reference isotopes.
    pub fn true_log_ratios(&self) -> Vec<f64> {
        let reference = self.abundances.last().copied().unwrap_or(1.0);
        self.abundances[..self.isotope_count().saturating_sub(1)]
            .iter()
            .map(|abundance| (abundance / reference).ln())
            .collect()
    }

    /// Reference intensity at time index `t`.
    pub fn intensity_at(&self, t: usize) -> f64 {
        let rows = self.timebase_len();
        if rows < 2 {
            return self.intensity_start;
        }
        let fraction = t as f64 / (rows - 1) as f64;
        self.intensity_start + (self.intensity_end - self.intensity_start) * fraction
    }

    /// Number of rows on the timebase.
    pub fn timebase_len(&self) -> usize {
        self.cycles * self.isotope_count()
    }

    /// Analysis method matching the generated species: direct ratios against
    /// the reference plus consecutive non-reference derived ratios.
    pub fn analysis_method(&self) -> Result<AnalysisMethod, IsoError> {
        let isotopes = self.isotope_count();
        let species = (0..isotopes)
            .map(|index| IsotopeSpecies::new(format!("iso{index}")))
            .collect();
        let reference = isotopes.saturating_sub(1);
        let direct = (0..reference)
            .map(|index| IsotopicRatio::new(index, reference))
            .collect();
        let derived = (1..reference)
            .map(|index| IsotopicRatio::new(index - 1, index))
            .collect();
        let detectors = (0..self.detector_count())
            .map(|index| format!("F{index}"))
            .collect();
        AnalysisMethod::new(species, direct, derived, detectors)
    }

    /// Generates the block with seeded Gaussian noise.
    pub fn generate(&self, rng: &mut RngHandle) -> Result<BlockDataSet, IsoError> {
        self.validate()?;
        let detectors = self.detector_count();
        let isotopes = self.isotope_count();
        let rows = self.timebase_len();

        let mut baseline = Vec::with_capacity(detectors * self.baseline_readings);
        for (detector, (&mean, &noise)) in self
            .baseline_means
            .iter()
            .zip(&self.baseline_noise)
            .enumerate()
        {
            let distribution = gaussian(mean, noise)?;
            for reading in 0..self.baseline_readings {
                baseline.push(AccumulatedReading::baseline(
                    detector,
                    reading % rows,
                    distribution.sample(rng),
                ));
            }
        }

        let reference = self.abundances[isotopes - 1];
        let mut onpeak_faraday = Vec::with_capacity(rows);
        let mut onpeak_photomultiplier = Vec::with_capacity(rows);
        for t in 0..rows {
            let isotope = t % isotopes;
            let detector = isotope % detectors;
            let ion_signal = self.abundances[isotope] / reference * self.intensity_at(t);

            let pm_sd = (self.shot_noise * ion_signal).max(0.0).sqrt();
            onpeak_photomultiplier.push(AccumulatedReading::photomultiplier(
                isotope,
                t,
                ion_signal + pm_sd * standard(rng),
            ));

            let faraday_signal = ion_signal / self.gain;
            let faraday_sd = (self.baseline_noise[detector].powi(2)
                + self.shot_noise * faraday_signal.max(0.0))
            .sqrt();
            onpeak_faraday.push(AccumulatedReading::faraday(
                detector,
                isotope,
                t,
                faraday_signal + self.baseline_means[detector] + faraday_sd * standard(rng),
            ));
        }

        Ok(BlockDataSet {
            block_id: self.block_id,
            detector_count: detectors,
            isotope_count: isotopes,
            baseline,
            onpeak_faraday,
            onpeak_photomultiplier,
            knot_basis: linear_knot_basis(rows, self.knot_count)?,
            cycle_start_indices: (0..self.cycles).map(|cycle| cycle * isotopes).collect(),
        })
    }

    fn validate(&self) -> Result<(), IsoError> {
        let shape_error = |code: &str, message: &str| {
            IsoError::DataShape(
                ErrorInfo::new(code, message).with_context("block", self.block_id),
            )
        };
        if self.baseline_means.is_empty() || self.baseline_means.len() != self.baseline_noise.len() {
            return Err(shape_error(
                "detector-spec",
                "baseline means and noise must be non-empty and equally long",
            ));
        }
        if self.abundances.is_empty() || self.abundances.iter().any(|a| *a <= 0.0) {
            return Err(shape_error("abundance-spec", "abundances must be positive"));
        }
        if self.cycles == 0 || self.baseline_readings == 0 {
            return Err(shape_error("empty-block", "cycles and baseline readings must be positive"));
        }
        if self.gain <= 0.0 {
            return Err(shape_error("gain-spec", "gain must be positive"));
        }
        Ok(())
    }
}

fn gaussian(mean: f64, std_dev: f64) -> Result<Normal<f64>, IsoError> {
    Normal::new(mean, std_dev).map_err(|err| {
        IsoError::DataShape(
            ErrorInfo::new("noise-spec", err.to_string()).with_context("std_dev", std_dev),
        )
    })
}

fn standard(rng: &mut RngHandle) -> f64 {
    rng.sample(rand_distr::StandardNormal)
}
