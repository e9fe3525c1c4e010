#![deny(missing_docs)]
#![doc = "Ensemble statistics engine: ratio, baseline, gain, noise and intensity summaries with plot-ready series."]

/// Block statistics computed from the post burn-in ensemble.
pub mod engine;
/// Fixed-bin histograms of ensemble series.
pub mod histogram;

pub use engine::{
    summary_text, BlockStatistics, IntensityCurve, RatioSeries, ScalarSeries, StatisticsEngine,
};
pub use histogram::Histogram;
