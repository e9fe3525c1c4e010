use isomc_core::{ErrorInfo, IsoError};
use nalgebra::DMatrix;

/// Builds a piecewise-linear ("hat") interpolation basis with `knot_count`
/// equally spaced knots across `timebase_len` time indices.
///
/// Rows are time indices, columns are knots; every row sums to one.
pub fn linear_knot_basis(timebase_len: usize, knot_count: usize) -> Result<DMatrix<f64>, IsoError> {
    if timebase_len == 0 || knot_count == 0 {
        return Err(IsoError::DataShape(
            ErrorInfo::new("empty-basis", "knot basis needs at least one row and one knot")
                .with_context("timebase_len", timebase_len)
                .with_context("knot_count", knot_count),
        ));
    }
    if knot_count == 1 || timebase_len == 1 {
        let mut basis = DMatrix::zeros(timebase_len, knot_count);
        basis.column_mut(0).fill(1.0);
        return Ok(basis);
    }
    let spacing = (timebase_len - 1) as f64 / (knot_count - 1) as f64;
    let mut basis = DMatrix::zeros(timebase_len, knot_count);
    for row in 0..timebase_len {
        let position = row as f64 / spacing;
        let left = (position.floor() as usize).min(knot_count - 2);
        let weight = (position - left as f64).clamp(0.0, 1.0);
        basis[(row, left)] = 1.0 - weight;
        basis[(row, left + 1)] += weight;
    }
    Ok(basis)
}
