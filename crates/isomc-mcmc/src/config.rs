use std::fs;
use std::path::Path;

use isomc_core::{ErrorInfo, IsoError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing one block's sampler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of Metropolis iterations per block.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Number of leading ensemble records discarded before statistics.
    #[serde(default = "default_burn_in")]
    pub burn_in: usize,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Selection distribution over the operation catalogue.
    #[serde(default)]
    pub operation_weights: OperationWeights,
    /// Proposal scaling and covariance adaptation.
    #[serde(default)]
    pub adaptation: AdaptationConfig,
    /// Box priors on every parameter group.
    #[serde(default)]
    pub priors: PriorBounds,
    /// Initial shot-noise hyper-parameter of every isotope.
    #[serde(default = "default_initial_isotope_noise")]
    pub initial_isotope_noise: f64,
    /// Number of bins used for histogram series.
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
}

fn default_iterations() -> usize {
    2000
}

fn default_burn_in() -> usize {
    500
}

fn default_initial_isotope_noise() -> f64 {
    11.0
}

fn default_histogram_bins() -> usize {
    25
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            burn_in: default_burn_in(),
            seed_policy: SeedPolicy::default(),
            operation_weights: OperationWeights::default(),
            adaptation: AdaptationConfig::default(),
            priors: PriorBounds::default(),
            initial_isotope_noise: default_initial_isotope_noise(),
            histogram_bins: default_histogram_bins(),
        }
    }
}

impl SamplerConfig {
    /// Parses a configuration from YAML text and validates it.
    pub fn from_yaml_str(text: &str) -> Result<Self, IsoError> {
        let config: SamplerConfig = serde_yaml::from_str(text).map_err(|err| {
            IsoError::Config(ErrorInfo::new("yaml-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, IsoError> {
        let text = fs::read_to_string(path).map_err(|err| {
            IsoError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&text).map_err(|err| match err {
            IsoError::Config(info) => {
                IsoError::Config(info.with_context("path", path.display()))
            }
            other => other,
        })
    }

    /// Serializes the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, IsoError> {
        serde_yaml::to_string(self)
            .map_err(|err| IsoError::Serde(ErrorInfo::new("yaml-serialize", err.to_string())))
    }

    /// Checks internal consistency of the configuration.
    pub fn validate(&self) -> Result<(), IsoError> {
        if self.iterations == 0 {
            return Err(config_error("zero-iterations", "iterations must be positive"));
        }
        if self.burn_in > self.iterations {
            return Err(IsoError::Config(
                ErrorInfo::new("burn-in-exceeds-iterations", "burn_in larger than iterations")
                    .with_context("burn_in", self.burn_in)
                    .with_context("iterations", self.iterations),
            ));
        }
        let weights = &self.operation_weights;
        let all = [
            weights.baseline,
            weights.log_ratio,
            weights.gain,
            weights.noise,
            weights.intensity,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(config_error(
                "negative-weight",
                "operation weights must be finite and non-negative",
            ));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(config_error("zero-weights", "at least one operation weight must be positive"));
        }
        let adaptation = &self.adaptation;
        if !(adaptation.target_acceptance > 0.0 && adaptation.target_acceptance < 1.0) {
            return Err(config_error(
                "target-acceptance-range",
                "target_acceptance must lie strictly between 0 and 1",
            ));
        }
        for (name, interval) in self.priors.named() {
            if !(interval.lower <= interval.upper) {
                return Err(IsoError::Config(
                    ErrorInfo::new("inverted-prior", "prior lower bound exceeds upper bound")
                        .with_context("prior", name)
                        .with_context("lower", interval.lower)
                        .with_context("upper", interval.upper),
                ));
            }
        }
        if self.histogram_bins == 0 {
            return Err(config_error("zero-bins", "histogram_bins must be positive"));
        }
        Ok(())
    }

    /// Checks that some operation with positive weight applies to a block
    /// with `isotope_count` species; log-ratio moves need at least two.
    pub fn validate_for_block(&self, block_id: u32, isotope_count: usize) -> Result<(), IsoError> {
        let weights = &self.operation_weights;
        let applicable = weights.baseline + weights.gain + weights.noise + weights.intensity
            + if isotope_count > 1 { weights.log_ratio } else { 0.0 };
        if applicable <= 0.0 {
            return Err(IsoError::Config(
                ErrorInfo::new(
                    "no-applicable-operation",
                    "every positively weighted operation is disabled for this block",
                )
                .with_context("block", block_id)
                .with_context("isotopes", isotope_count)
                .with_hint("give baseline, gain, noise or intensity a positive weight"),
            ));
        }
        Ok(())
    }
}

fn config_error(code: &str, message: &str) -> IsoError {
    IsoError::Config(ErrorInfo::new(code, message))
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label folded into the master seed before deriving block seeds.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x15_0C_A7_E5_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Relative selection weight of each sampler operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationWeights {
    /// Perturb one detector baseline.
    #[serde(default = "default_weight")]
    pub baseline: f64,
    /// Perturb one log-ratio.
    #[serde(default = "default_log_ratio_weight")]
    pub log_ratio: f64,
    /// Perturb the Faraday gain.
    #[serde(default = "default_weight")]
    pub gain: f64,
    /// Perturb one noise hyper-parameter.
    #[serde(default = "default_weight")]
    pub noise: f64,
    /// Perturb the block of intensity knots.
    #[serde(default = "default_intensity_weight")]
    pub intensity: f64,
}

fn default_weight() -> f64 {
    1.0
}

fn default_log_ratio_weight() -> f64 {
    2.0
}

fn default_intensity_weight() -> f64 {
    2.0
}

impl Default for OperationWeights {
    fn default() -> Self {
        Self {
            baseline: default_weight(),
            log_ratio: default_log_ratio_weight(),
            gain: default_weight(),
            noise: default_weight(),
            intensity: default_intensity_weight(),
        }
    }
}

/// Proposal scaling and adaptation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Iteration from which proposals are scaled by the running covariance.
    #[serde(default = "default_start_iteration")]
    pub start_iteration: usize,
    /// Acceptance probability each operation's step scale is tuned toward.
    #[serde(default = "default_target_acceptance")]
    pub target_acceptance: f64,
    /// Relative diagonal jitter used when the knot covariance is not positive definite.
    #[serde(default = "default_covariance_jitter")]
    pub covariance_jitter: f64,
    /// Initial learning rate of the stochastic step-scale update.
    #[serde(default = "default_scale_learning_rate")]
    pub scale_learning_rate: f64,
    /// Iterations between adaptation log checkpoints.
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,
    /// Step sizes used before covariance adaptation starts.
    #[serde(default)]
    pub initial_steps: InitialSteps,
}

fn default_start_iteration() -> usize {
    200
}

fn default_target_acceptance() -> f64 {
    0.35
}

fn default_covariance_jitter() -> f64 {
    1e-6
}

fn default_scale_learning_rate() -> f64 {
    1.0
}

fn default_report_interval() -> usize {
    500
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            start_iteration: default_start_iteration(),
            target_acceptance: default_target_acceptance(),
            covariance_jitter: default_covariance_jitter(),
            scale_learning_rate: default_scale_learning_rate(),
            report_interval: default_report_interval(),
            initial_steps: InitialSteps::default(),
        }
    }
}

/// Pre-adaptation proposal standard deviations.
///
/// Log-ratio steps are absolute; all other steps are fractions of the
/// current value (or of the detector noise, for baselines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialSteps {
    /// Absolute log-ratio step.
    #[serde(default = "default_log_ratio_step")]
    pub log_ratio: f64,
    /// Knot step as a fraction of the knot value.
    #[serde(default = "default_intensity_fraction")]
    pub intensity_fraction: f64,
    /// Baseline step as a fraction of the detector baseline standard deviation.
    #[serde(default = "default_baseline_fraction")]
    pub baseline_fraction: f64,
    /// Gain step as a fraction of the gain.
    #[serde(default = "default_gain_fraction")]
    pub gain_fraction: f64,
    /// Noise step as a fraction of the noise value (at least one unit).
    #[serde(default = "default_noise_fraction")]
    pub noise_fraction: f64,
}

fn default_log_ratio_step() -> f64 {
    1e-3
}

fn default_intensity_fraction() -> f64 {
    1e-3
}

fn default_baseline_fraction() -> f64 {
    0.1
}

fn default_gain_fraction() -> f64 {
    1e-3
}

fn default_noise_fraction() -> f64 {
    0.05
}

impl Default for InitialSteps {
    fn default() -> Self {
        Self {
            log_ratio: default_log_ratio_step(),
            intensity_fraction: default_intensity_fraction(),
            baseline_fraction: default_baseline_fraction(),
            gain_fraction: default_gain_fraction(),
            noise_fraction: default_noise_fraction(),
        }
    }
}

/// Closed interval used as a flat prior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Inclusive upper bound.
    pub upper: f64,
}

impl Interval {
    /// Creates an interval.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Whether `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// Nearest point of the interval; NaN maps to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.lower).min(self.upper)
    }
}

/// Flat box priors per parameter group; anything outside has zero prior mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorBounds {
    /// Bounds on every log-ratio.
    #[serde(default = "default_log_ratio_prior")]
    pub log_ratio: Interval,
    /// Bounds on every detector baseline.
    #[serde(default = "default_baseline_prior")]
    pub baseline: Interval,
    /// Bounds on the Faraday gain.
    #[serde(default = "default_gain_prior")]
    pub gain: Interval,
    /// Bounds on every intensity knot.
    #[serde(default = "default_intensity_prior")]
    pub intensity: Interval,
    /// Bounds on every noise hyper-parameter.
    #[serde(default = "default_noise_prior")]
    pub noise: Interval,
}

fn default_log_ratio_prior() -> Interval {
    Interval::new(-30.0, 30.0)
}

fn default_baseline_prior() -> Interval {
    Interval::new(-1e9, 1e9)
}

fn default_gain_prior() -> Interval {
    Interval::new(1e-12, 1e12)
}

fn default_intensity_prior() -> Interval {
    Interval::new(0.0, 1e15)
}

fn default_noise_prior() -> Interval {
    Interval::new(0.0, 1e12)
}

impl Default for PriorBounds {
    fn default() -> Self {
        Self {
            log_ratio: default_log_ratio_prior(),
            baseline: default_baseline_prior(),
            gain: default_gain_prior(),
            intensity: default_intensity_prior(),
            noise: default_noise_prior(),
        }
    }
}

impl PriorBounds {
    fn named(&self) -> [(&'static str, Interval); 5] {
        [
            ("log_ratio", self.log_ratio),
            ("baseline", self.baseline),
            ("gain", self.gain),
            ("intensity", self.intensity),
            ("noise", self.noise),
        ]
    }
}
