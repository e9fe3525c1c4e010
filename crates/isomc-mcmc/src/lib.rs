#![deny(missing_docs)]

//! Single-block Metropolis engine for isotope-ratio mass-spectrometer
//! measurements: closed-form initialization, adaptive sampling into an
//! append-only ensemble, and block sessions that run in parallel.

/// YAML configuration schema and defaults.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Append-only ensemble store with burn-in marker.
pub mod ensemble;
/// Closed-form initial estimate.
pub mod init;
/// Forward model, parameter layout and likelihood.
pub mod model;
/// Block sessions, orchestration handle and parallel runner.
pub mod session;
/// Run summaries and ensemble hashing.
pub mod summary;
/// Synthetic block generator for tests, benches and the CLI.
pub mod synthetic;
/// Adaptive Metropolis sampler.
pub mod updater;

pub use config::{
    AdaptationConfig, InitialSteps, Interval, OperationWeights, PriorBounds, SamplerConfig,
    SeedPolicy,
};
pub use ensemble::EnsembleStore;
pub use init::{initialize, BaselineStatistics, InitialEstimate};
pub use model::{log_prior, project_into_support, ObservationModel, ParameterLayout};
pub use session::{run_blocks, BlockHandle, BlockSession, BlockStatus};
pub use summary::{ensemble_hash, RunOutcome, RunSummary};
pub use synthetic::SyntheticBlockSpec;
pub use updater::{ModelUpdater, OperationKind, StepOutcome};
