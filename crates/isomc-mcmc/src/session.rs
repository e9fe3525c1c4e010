//! Block-owned sampler sessions and the orchestration handle shared with
//! whoever decides which blocks run, show or skip.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use isomc_core::{AnalysisMethod, BlockDataSet, ErrorInfo, IsoError};
use isomc_stats::{BlockStatistics, StatisticsEngine};
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SamplerConfig;
use crate::determinism;
use crate::ensemble::EnsembleStore;
use crate::init::{initialize, InitialEstimate};
use crate::model::{project_into_support, ObservationModel};
use crate::summary::{ensemble_hash, RunOutcome, RunSummary};
use crate::updater::{overall_rate, ModelUpdater};

/// Processing status requested for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum BlockStatus {
    /// Block should be (re)processed.
    Run = 0,
    /// Block has results to show.
    Show = 1,
    /// Block is excluded; a running sampler stops at the next iteration boundary.
    Skip = 2,
}

impl BlockStatus {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => BlockStatus::Show,
            2 => BlockStatus::Skip,
            _ => BlockStatus::Run,
        }
    }
}

/// Cloneable view of a block's progress; shares only atomics with the session.
#[derive(Debug, Clone)]
pub struct BlockHandle {
    block_id: u32,
    status: Arc<AtomicU8>,
    completed: Arc<AtomicBool>,
    iterations: Arc<AtomicUsize>,
    burn_in: Arc<AtomicUsize>,
}

impl BlockHandle {
    fn new(block_id: u32) -> Self {
        Self {
            block_id,
            status: Arc::new(AtomicU8::new(BlockStatus::Run as u8)),
            completed: Arc::new(AtomicBool::new(false)),
            iterations: Arc::new(AtomicUsize::new(0)),
            burn_in: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Block the handle observes.
    pub fn block_id(&self) -> u32 {
        self.block_id
    }

    /// Current status.
    pub fn status(&self) -> BlockStatus {
        BlockStatus::from_raw(self.status.load(Ordering::Acquire))
    }

    /// Requests a status; `Skip` cancels a running sampler.
    pub fn set_status(&self, status: BlockStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Whether the sampler reached its iteration budget.
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Iterations executed so far.
    pub fn iterations(&self) -> usize {
        self.iterations.load(Ordering::Acquire)
    }

    /// Burn-in currently applied to the ensemble.
    pub fn burn_in(&self) -> usize {
        self.burn_in.load(Ordering::Acquire)
    }
}

/// Everything one block needs to initialize, sample and summarise, owned
/// exclusively by that block.
#[derive(Debug)]
pub struct BlockSession {
    block: Arc<BlockDataSet>,
    config: SamplerConfig,
    handle: BlockHandle,
    store: EnsembleStore,
    accepted_trace: Vec<bool>,
    initial: Option<InitialEstimate>,
    log: Vec<String>,
}

impl BlockSession {
    /// Creates a session after validating the configuration and block shape.
    pub fn new(block: BlockDataSet, config: SamplerConfig) -> Result<Self, IsoError> {
        config.validate()?;
        block.validate_shape()?;
        config.validate_for_block(block.block_id, block.isotope_count)?;
        Ok(Self {
            handle: BlockHandle::new(block.block_id),
            block: Arc::new(block),
            config,
            store: EnsembleStore::new(),
            accepted_trace: Vec::new(),
            initial: None,
            log: Vec::new(),
        })
    }

    /// Block identifier.
    pub fn block_id(&self) -> u32 {
        self.block.block_id
    }

    /// Input data of the block.
    pub fn block(&self) -> &BlockDataSet {
        &self.block
    }

    /// Sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Orchestration handle sharing status and progress with other threads.
    pub fn handle(&self) -> BlockHandle {
        self.handle.clone()
    }

    /// Stored ensemble.
    pub fn ensemble(&self) -> &EnsembleStore {
        &self.store
    }

    /// Starting estimate of the latest run.
    pub fn initial_estimate(&self) -> Option<&InitialEstimate> {
        self.initial.as_ref()
    }

    /// Per-block log text.
    pub fn log_lines(&self) -> &[String] {
        &self.log
    }

    /// Discards the ensemble and all sampler state; the block returns to `Run`.
    pub fn reset(&mut self) {
        self.clear_state();
        self.handle.set_status(BlockStatus::Run);
    }

    fn clear_state(&mut self) {
        self.store.clear();
        self.accepted_trace.clear();
        self.initial = None;
        self.log.clear();
        self.handle.completed.store(false, Ordering::Release);
        self.handle.iterations.store(0, Ordering::Release);
        self.handle.burn_in.store(0, Ordering::Release);
    }

    /// Initializes and samples the block.
    ///
    /// Any previous ensemble is discarded first. A `Skip` status observed at an
    /// iteration boundary ends the run with [`RunOutcome::Cancelled`]; the block
    /// is then never marked complete.
    pub fn run(&mut self) -> Result<RunSummary, IsoError> {
        self.clear_state();
        // A concurrent Skip must not be overwritten.
        let _ = self.handle.status.compare_exchange(
            BlockStatus::Show as u8,
            BlockStatus::Run as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if self.handle.status() == BlockStatus::Skip {
            warn!("block {}: skipped before start", self.block_id());
            self.note(format!("block {} skipped before start", self.block_id()));
            return self.summarize(RunOutcome::Cancelled);
        }

        info!(
            "block {}: sampling {} iterations",
            self.block_id(),
            self.config.iterations
        );
        let estimate = initialize(&self.block, self.config.initial_isotope_noise)?;
        self.note(format!("block {}: {}", self.block_id(), estimate.summary_line()));

        let model = ObservationModel::new(&self.block);
        let mut start = estimate.parameters.clone();
        if project_into_support(&mut start, &self.config.priors) {
            model.refresh(&mut start);
            let line = format!(
                "block {}: initial estimate clamped into the prior support",
                self.block_id()
            );
            warn!("{line}");
            self.note(line);
        }
        let mut updater = ModelUpdater::new(model, start, &self.config);
        if !updater.current_log_posterior().is_finite() {
            return Err(IsoError::Numerical(
                ErrorInfo::new(
                    "initial-state-outside-support",
                    "starting state has no finite posterior density",
                )
                .with_context("block", self.block_id())
                .with_context("log_posterior", updater.current_log_posterior()),
            ));
        }
        self.initial = Some(estimate);
        let mut rng = determinism::block_rng(&self.config.seed_policy, self.block_id());
        self.store = EnsembleStore::with_capacity(self.config.iterations);

        let mut outcome = RunOutcome::Completed;
        for _ in 0..self.config.iterations {
            if self.handle.status() == BlockStatus::Skip {
                warn!(
                    "block {}: skip requested after {} iterations",
                    self.block_id(),
                    updater.iteration()
                );
                outcome = RunOutcome::Cancelled;
                break;
            }
            let step = updater.step(&mut rng)?;
            self.store.push_state(step.iteration, step.parameters)?;
            self.accepted_trace.push(step.accepted);
            self.handle.iterations.store(step.iteration, Ordering::Release);
        }

        self.finish(outcome, &updater)
    }

    fn finish(&mut self, outcome: RunOutcome, updater: &ModelUpdater) -> Result<RunSummary, IsoError> {
        if outcome == RunOutcome::Completed {
            let burn_in = self.config.burn_in.min(self.store.len());
            self.set_burn_in(burn_in)?;
            self.handle.completed.store(true, Ordering::Release);
            self.handle.set_status(BlockStatus::Show);
        }
        let mut summary = self.summarize(outcome)?;
        summary.acceptance_rates = updater.acceptance_rates();
        summary.overall_acceptance = overall_rate(updater.proposed(), updater.accepted());
        summary.degenerate_proposals = updater.degenerate_count();
        let line = format!(
            "block {}: {:?} after {} iterations, acceptance {:.3}",
            self.block_id(),
            outcome,
            summary.iterations,
            summary.overall_acceptance
        );
        info!("{line}");
        self.note(line);
        Ok(summary)
    }

    fn summarize(&self, outcome: RunOutcome) -> Result<RunSummary, IsoError> {
        let late = self.accepted_trace.get(self.store.burn_in()..).unwrap_or(&[]);
        let late_accepted = late.iter().filter(|accepted| **accepted).count();
        Ok(RunSummary {
            block_id: self.block_id(),
            outcome,
            iterations: self.store.len(),
            burn_in: self.store.burn_in(),
            acceptance_rates: Default::default(),
            overall_acceptance: 0.0,
            post_burn_in_acceptance: if late.is_empty() {
                0.0
            } else {
                late_accepted as f64 / late.len() as f64
            },
            degenerate_proposals: 0,
            reference_convention_holds: self
                .initial
                .as_ref()
                .map_or(true, |estimate| estimate.reference_convention_holds),
            ensemble_hash: ensemble_hash(self.store.snapshot())?,
        })
    }

    /// Moves the burn-in marker of the stored ensemble.
    pub fn set_burn_in(&mut self, burn_in: usize) -> Result<(), IsoError> {
        self.store.set_burn_in(burn_in)?;
        self.handle.burn_in.store(burn_in, Ordering::Release);
        Ok(())
    }

    /// Summarises the post burn-in ensemble.
    ///
    /// Refused until the sampler has signalled completion.
    pub fn statistics(&self, method: &AnalysisMethod) -> Result<BlockStatistics, IsoError> {
        if !self.handle.is_complete() {
            return Err(IsoError::Ensemble(
                ErrorInfo::new("block-not-complete", "sampler has not completed for this block")
                    .with_context("block", self.block_id())
                    .with_context("iterations", self.handle.iterations()),
            ));
        }
        StatisticsEngine::new(method, self.config.histogram_bins)
            .compute(&self.block, self.store.usable())
    }

    fn note(&mut self, line: String) {
        self.log.push(line);
    }
}

/// Runs every session on the rayon pool; results keep the input order and a
/// failing block never affects its siblings.
pub fn run_blocks(sessions: &mut [BlockSession]) -> Vec<Result<RunSummary, IsoError>> {
    sessions
        .par_iter_mut()
        .map(|session| {
            let result = session.run();
            if let Err(err) = &result {
                warn!("block {} failed: {}", session.block_id(), err);
                session.note(format!("block {} failed: {}", session.block_id(), err));
            }
            result
        })
        .collect()
}
