use std::collections::BTreeMap;

use isomc_core::{EnsembleRecord, ErrorInfo, IsoError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// How a block's sampler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Iteration budget reached.
    Completed,
    /// Block was marked skip before the budget was reached.
    Cancelled,
}

/// Summary returned after a block run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Block the summary belongs to.
    pub block_id: u32,
    /// Whether the run completed or was cancelled.
    pub outcome: RunOutcome,
    /// Iterations executed (equals the number of ensemble records).
    pub iterations: usize,
    /// Burn-in applied to the stored ensemble.
    pub burn_in: usize,
    /// Acceptance rate per operation label.
    pub acceptance_rates: BTreeMap<String, f64>,
    /// Acceptance rate over every iteration.
    pub overall_acceptance: f64,
    /// Acceptance rate over the iterations after burn-in.
    pub post_burn_in_acceptance: f64,
    /// Candidates rejected because they could not be evaluated.
    pub degenerate_proposals: usize,
    /// Whether the largest photomultiplier mean sat on the reference species.
    pub reference_convention_holds: bool,
    /// SHA-256 over the sampled quantities of every record.
    pub ensemble_hash: String,
}

#[derive(Serialize)]
struct RecordPayload<'a> {
    iteration: usize,
    log_ratios: &'a [f64],
    knots: &'a [f64],
    baselines: &'a [f64],
    gain: f64,
    noise: &'a [f64],
}

/// Hash of the ensemble's sampled quantities, stable across runs and platforms.
pub fn ensemble_hash(records: &[EnsembleRecord]) -> Result<String, IsoError> {
    let mut hasher = Sha256::new();
    for record in records {
        let params = &record.parameters;
        let payload = RecordPayload {
            iteration: record.iteration_index,
            log_ratios: &params.log_ratios,
            knots: &params.intensity_knots,
            baselines: &params.baseline_means,
            gain: params.faraday_gain,
            noise: &params.signal_noise,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|err| IsoError::Serde(ErrorInfo::new("serialize", err.to_string())))?;
        hasher.update(json);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
