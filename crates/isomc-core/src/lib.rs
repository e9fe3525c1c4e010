#![deny(missing_docs)]
#![doc = "Core data model, error surface and deterministic RNG for the isotope-ratio MCMC engine."]

pub mod errors;
pub mod rng;
pub mod species;
mod types;

pub use errors::{ErrorInfo, IsoError};
pub use rng::{derive_substream_seed, RngHandle};
pub use species::{
    AnalysisMethod, IsotopeSpecies, IsotopicRatio, MethodDefinition, RatioLookup, RatioPairTable,
};
pub use types::{
    AccumulatedReading, BlockDataSet, EnsembleRecord, ModelParameters, ReadingCategory,
};
