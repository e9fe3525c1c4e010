#![deny(missing_docs)]
#![doc = "Linear-algebra support shared by the initializer, the sampler and the statistics engine."]

/// Piecewise-linear knot interpolation bases.
pub mod basis;
/// Normal-equation least squares and Cholesky helpers.
pub mod solve;
/// Descriptive statistics and the online mean/covariance accumulator.
pub mod moments;

pub use basis::linear_knot_basis;
pub use moments::{describe, Moments, RunningMoments};
pub use solve::{cholesky_factor, least_squares};
