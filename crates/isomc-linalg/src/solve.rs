use isomc_core::{ErrorInfo, IsoError};
use log::debug;
use nalgebra::{Cholesky, DMatrix, DVector};

/// Squared ratio of the smallest to the largest Cholesky pivot below which the
/// normal equations are treated as singular.
const CONDITION_FLOOR: f64 = 1e-14;

/// Solves `(Kᵗ·K)·x = Kᵗ·rhs` through a Cholesky factorisation of the normal
/// matrix.
///
/// Fails with [`IsoError::Numerical`] when the normal matrix is not positive
/// definite or is too poorly conditioned to give a meaningful solution.
pub fn least_squares(design: &DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>, IsoError> {
    if design.nrows() != rhs.len() {
        return Err(IsoError::DataShape(
            ErrorInfo::new("lsq-shape", "design rows and right-hand side differ in length")
                .with_context("rows", design.nrows())
                .with_context("rhs", rhs.len()),
        ));
    }
    if design.ncols() == 0 || design.nrows() < design.ncols() {
        return Err(IsoError::Numerical(
            ErrorInfo::new("underdetermined", "fewer observations than unknowns")
                .with_context("rows", design.nrows())
                .with_context("cols", design.ncols()),
        ));
    }
    let transposed = design.transpose();
    let normal = &transposed * design;
    let projected = &transposed * rhs;
    let factor = Cholesky::new(normal).ok_or_else(|| {
        IsoError::Numerical(
            ErrorInfo::new("singular-normal-equations", "KᵗK is not positive definite")
                .with_context("cols", design.ncols())
                .with_hint("check that every knot is supported by observed time indices"),
        )
    })?;
    let pivots = factor.l_dirty().diagonal();
    let largest = pivots.amax();
    let smallest = pivots.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));
    let condition = (smallest / largest).powi(2);
    if !condition.is_finite() || condition < CONDITION_FLOOR {
        return Err(IsoError::Numerical(
            ErrorInfo::new("ill-conditioned-normal-equations", "KᵗK is numerically singular")
                .with_context("reciprocal_condition", format!("{condition:e}")),
        ));
    }
    Ok(factor.solve(&projected))
}

/// Lower Cholesky factor of a covariance matrix.
///
/// When the matrix is not positive definite a diagonal jitter proportional to
/// its mean diagonal is added once before giving up. Non-finite entries
/// always yield `None`.
pub fn cholesky_factor(covariance: &DMatrix<f64>, jitter: f64) -> Option<DMatrix<f64>> {
    if covariance.iter().any(|value| !value.is_finite()) {
        return None;
    }
    if let Some(factor) = Cholesky::new(covariance.clone()) {
        return Some(factor.l());
    }
    let n = covariance.nrows();
    if n == 0 {
        return None;
    }
    let scale = (covariance.trace() / n as f64).abs().max(f64::MIN_POSITIVE);
    let mut jittered = covariance.clone();
    for i in 0..n {
        jittered[(i, i)] += jitter * scale;
    }
    debug!("cholesky retry with diagonal jitter {:e}", jitter * scale);
    Cholesky::new(jittered).map(|factor| factor.l())
}
