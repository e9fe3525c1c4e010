//! Adaptive Metropolis sampler over the block model parameters.

use std::collections::BTreeMap;
use std::sync::Arc;

use isomc_core::{IsoError, ModelParameters, RngHandle};
use isomc_linalg::{cholesky_factor, RunningMoments};
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::config::SamplerConfig;
use crate::model::{log_prior, ObservationModel, ParameterLayout};

/// Kind of perturbation applied by one sampler iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Perturb one detector baseline.
    Baseline,
    /// Perturb one log-ratio.
    LogRatio,
    /// Perturb the Faraday gain.
    Gain,
    /// Perturb one noise hyper-parameter.
    Noise,
    /// Perturb all intensity knots jointly.
    Intensity,
}

impl OperationKind {
    /// Every operation in catalogue order.
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Baseline,
        OperationKind::LogRatio,
        OperationKind::Gain,
        OperationKind::Noise,
        OperationKind::Intensity,
    ];

    /// Stable label used in summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Baseline => "baseline",
            OperationKind::LogRatio => "log-ratio",
            OperationKind::Gain => "gain",
            OperationKind::Noise => "noise",
            OperationKind::Intensity => "intensity",
        }
    }
}

/// Result of one sampler iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// One-based index of the iteration.
    pub iteration: usize,
    /// Operation that was attempted.
    pub operation: OperationKind,
    /// Whether the candidate replaced the current state.
    pub accepted: bool,
    /// Whether the candidate could not be evaluated (singular factor, non-finite likelihood).
    pub degenerate: bool,
    /// Current state after the iteration; shared with the previous record when retained.
    pub parameters: Arc<ModelParameters>,
}

/// Sampler state scoped to one block.
#[derive(Debug, Clone)]
pub struct ModelUpdater {
    model: ObservationModel,
    layout: ParameterLayout,
    config: SamplerConfig,
    current: Arc<ModelParameters>,
    current_log_posterior: f64,
    moments: RunningMoments,
    log_scales: BTreeMap<OperationKind, f64>,
    proposed: BTreeMap<OperationKind, usize>,
    accepted: BTreeMap<OperationKind, usize>,
    degenerate: usize,
    iteration: usize,
}

impl ModelUpdater {
    /// Creates a sampler starting from `initial`.
    pub fn new(model: ObservationModel, initial: ModelParameters, config: &SamplerConfig) -> Self {
        let layout = ParameterLayout::new(
            model.isotope_count(),
            model.knot_count(),
            model.detector_count(),
        );
        let current_log_posterior =
            model.log_likelihood(&initial) + log_prior(&initial, &config.priors);
        Self {
            model,
            layout,
            config: config.clone(),
            current: Arc::new(initial),
            current_log_posterior,
            moments: RunningMoments::new(layout.len()),
            log_scales: BTreeMap::new(),
            proposed: BTreeMap::new(),
            accepted: BTreeMap::new(),
            degenerate: 0,
            iteration: 0,
        }
    }

    /// Current state.
    pub fn current(&self) -> &Arc<ModelParameters> {
        &self.current
    }

    /// Log posterior of the current state.
    pub fn current_log_posterior(&self) -> f64 {
        self.current_log_posterior
    }

    /// Number of iterations completed.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Layout of the adapted parameter vector.
    pub fn layout(&self) -> ParameterLayout {
        self.layout
    }

    /// Running mean and covariance of the visited states.
    pub fn moments(&self) -> &RunningMoments {
        &self.moments
    }

    /// Proposals attempted per operation.
    pub fn proposed(&self) -> &BTreeMap<OperationKind, usize> {
        &self.proposed
    }

    /// Proposals accepted per operation.
    pub fn accepted(&self) -> &BTreeMap<OperationKind, usize> {
        &self.accepted
    }

    /// Candidates rejected because they could not be evaluated.
    pub fn degenerate_count(&self) -> usize {
        self.degenerate
    }

    /// Runs one Metropolis iteration.
    pub fn step(&mut self, rng: &mut RngHandle) -> Result<StepOutcome, IsoError> {
        self.iteration += 1;
        let operation = self.select_operation(rng);
        let mut degenerate = false;
        let accepted = match self.propose(operation, rng) {
            Some(candidate) => {
                let log_posterior = self.model.log_likelihood(&candidate)
                    + log_prior(&candidate, &self.config.priors);
                if log_posterior.is_nan() || log_posterior == f64::INFINITY {
                    degenerate = true;
                    false
                } else {
                    let delta = log_posterior - self.current_log_posterior;
                    // f64::min would turn a NaN ratio into a certain acceptance.
                    let acceptance = if delta.is_nan() { 0.0 } else { delta.exp().min(1.0) };
                    let accepted = rng.next_unit() < acceptance;
                    if accepted {
                        self.current = Arc::new(candidate);
                        self.current_log_posterior = log_posterior;
                    }
                    accepted
                }
            }
            None => {
                degenerate = true;
                false
            }
        };
        if degenerate {
            self.degenerate += 1;
        }
        *self.proposed.entry(operation).or_insert(0) += 1;
        if accepted {
            *self.accepted.entry(operation).or_insert(0) += 1;
        }
        self.adapt_scale(operation, accepted);
        self.moments.update(&self.layout.to_vector(&self.current))?;
        self.report_adaptation();
        Ok(StepOutcome {
            iteration: self.iteration,
            operation,
            accepted,
            degenerate,
            parameters: Arc::clone(&self.current),
        })
    }

    fn select_operation(&self, rng: &mut RngHandle) -> OperationKind {
        let weights = &self.config.operation_weights;
        let candidates = OperationKind::ALL.map(|kind| {
            let weight = match kind {
                OperationKind::Baseline => weights.baseline,
                OperationKind::LogRatio if self.current.log_ratios.is_empty() => 0.0,
                OperationKind::LogRatio => weights.log_ratio,
                OperationKind::Gain => weights.gain,
                OperationKind::Noise => weights.noise,
                OperationKind::Intensity => weights.intensity,
            };
            (kind, weight)
        });
        let total: f64 = candidates.iter().map(|(_, weight)| weight).sum();
        let mut draw = rng.next_unit() * total;
        for (kind, weight) in candidates {
            if weight <= 0.0 {
                continue;
            }
            if draw < weight {
                return kind;
            }
            draw -= weight;
        }
        candidates
            .iter()
            .rev()
            .find(|(_, weight)| *weight > 0.0)
            .map(|(kind, _)| *kind)
            .unwrap_or(OperationKind::Intensity)
    }

    fn adapted(&self) -> bool {
        self.iteration > self.config.adaptation.start_iteration && self.moments.count() >= 2
    }

    fn scale(&self, operation: OperationKind) -> f64 {
        self.log_scales.get(&operation).copied().unwrap_or(0.0).exp()
    }

    /// Standard deviation for a single coordinate of the adapted vector.
    fn coordinate_step(&self, index: usize, fallback: f64) -> f64 {
        let variance = self.moments.variance(index);
        if self.adapted() && variance > 0.0 {
            variance.sqrt()
        } else {
            fallback
        }
    }

    fn propose(&self, operation: OperationKind, rng: &mut RngHandle) -> Option<ModelParameters> {
        let steps = &self.config.adaptation.initial_steps;
        let scale = self.scale(operation);
        let mut candidate = (*self.current).clone();
        match operation {
            OperationKind::Baseline => {
                let detector = rng.gen_range(0..candidate.baseline_means.len());
                let fallback = steps.baseline_fraction
                    * candidate.baseline_std_devs[detector].abs().max(1.0);
                let index = self.layout.baseline_range().start + detector;
                candidate.baseline_means[detector] +=
                    scale * self.coordinate_step(index, fallback) * normal(rng);
            }
            OperationKind::LogRatio => {
                let isotope = rng.gen_range(0..candidate.log_ratios.len());
                let index = self.layout.log_ratio_range().start + isotope;
                candidate.log_ratios[isotope] +=
                    scale * self.coordinate_step(index, steps.log_ratio) * normal(rng);
            }
            OperationKind::Gain => {
                let fallback = steps.gain_fraction * candidate.faraday_gain.abs();
                candidate.faraday_gain +=
                    scale * self.coordinate_step(self.layout.gain_index(), fallback) * normal(rng);
            }
            OperationKind::Noise => {
                let slot = rng.gen_range(0..candidate.signal_noise.len());
                let value = candidate.signal_noise[slot];
                candidate.signal_noise[slot] +=
                    scale * steps.noise_fraction * value.abs().max(1.0) * normal(rng);
            }
            OperationKind::Intensity => {
                let delta = self.knot_perturbation(&candidate.intensity_knots, rng)?;
                for (knot, step) in candidate.intensity_knots.iter_mut().zip(delta.iter()) {
                    *knot += scale * step;
                }
            }
        }
        self.model.refresh(&mut candidate);
        Some(candidate)
    }

    /// Correlated knot step from the running covariance, or an independent
    /// relative step before adaptation. `None` when the covariance cannot be
    /// factorised.
    fn knot_perturbation(&self, knots: &[f64], rng: &mut RngHandle) -> Option<DVector<f64>> {
        let draws = DVector::from_iterator(knots.len(), (0..knots.len()).map(|_| normal(rng)));
        if !self.adapted() {
            let fraction = self.config.adaptation.initial_steps.intensity_fraction;
            return Some(DVector::from_iterator(
                knots.len(),
                knots
                    .iter()
                    .zip(draws.iter())
                    .map(|(knot, z)| fraction * knot.abs().max(1.0) * z),
            ));
        }
        let range = self.layout.knot_range();
        let covariance = self.moments.covariance();
        let block: DMatrix<f64> = covariance
            .view((range.start, range.start), (range.len(), range.len()))
            .into_owned();
        let factor = cholesky_factor(&block, self.config.adaptation.covariance_jitter)?;
        Some(factor * draws)
    }

    /// Robbins-Monro update of the per-operation log step scale.
    fn adapt_scale(&mut self, operation: OperationKind, accepted: bool) {
        let adaptation = &self.config.adaptation;
        let attempts = self.proposed.get(&operation).copied().unwrap_or(1) as f64;
        let gain = adaptation.scale_learning_rate / attempts.powf(0.6);
        let signal = if accepted { 1.0 } else { 0.0 } - adaptation.target_acceptance;
        *self.log_scales.entry(operation).or_insert(0.0) += gain * signal;
    }

    fn report_adaptation(&self) {
        let adaptation = &self.config.adaptation;
        if self.iteration == adaptation.start_iteration + 1 {
            debug!(
                "iteration {}: proposals now scaled by running covariance",
                self.iteration
            );
        }
        if adaptation.report_interval > 0 && self.iteration % adaptation.report_interval == 0 {
            let scales: Vec<String> = self
                .log_scales
                .iter()
                .map(|(kind, log_scale)| format!("{}={:.3}", kind.as_str(), log_scale.exp()))
                .collect();
            debug!(
                "iteration {}: acceptance {:.3}, step scales [{}]",
                self.iteration,
                overall_rate(&self.proposed, &self.accepted),
                scales.join(", ")
            );
        }
    }

    /// Acceptance rate per operation label.
    pub fn acceptance_rates(&self) -> BTreeMap<String, f64> {
        self.proposed
            .iter()
            .map(|(kind, proposed)| {
                let accepted = self.accepted.get(kind).copied().unwrap_or(0);
                (kind.as_str().to_string(), rate(accepted, *proposed))
            })
            .collect()
    }
}

fn normal(rng: &mut RngHandle) -> f64 {
    rng.sample(StandardNormal)
}

fn rate(accepted: usize, proposed: usize) -> f64 {
    if proposed == 0 {
        0.0
    } else {
        accepted as f64 / proposed as f64
    }
}

/// Overall acceptance rate across operations.
pub fn overall_rate(
    proposed: &BTreeMap<OperationKind, usize>,
    accepted: &BTreeMap<OperationKind, usize>,
) -> f64 {
    rate(accepted.values().sum(), proposed.values().sum())
}
