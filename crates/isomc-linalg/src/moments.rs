use isomc_core::{ErrorInfo, IsoError};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Mean and sample standard deviation of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (`n - 1` denominator); zero for fewer than two values.
    pub std_dev: f64,
}

/// Computes the mean and sample standard deviation of `values`.
///
/// Returns `None` for an empty slice.
pub fn describe(values: &[f64]) -> Option<Moments> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if values.len() < 2 {
        0.0
    } else {
        let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (n - 1.0)).sqrt()
    };
    Some(Moments { mean, std_dev })
}

/// Multivariate Welford accumulator for the running mean and covariance of a
/// parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningMoments {
    count: usize,
    mean: DVector<f64>,
    comoment: DMatrix<f64>,
}

impl RunningMoments {
    /// Creates an empty accumulator for vectors of length `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            count: 0,
            mean: DVector::zeros(dimension),
            comoment: DMatrix::zeros(dimension, dimension),
        }
    }

    /// Length of the tracked vectors.
    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Number of vectors folded in so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Folds one observation into the running estimates.
    pub fn update(&mut self, sample: &[f64]) -> Result<(), IsoError> {
        if sample.len() != self.dimension() {
            return Err(IsoError::DataShape(
                ErrorInfo::new("moments-dimension", "sample length differs from accumulator")
                    .with_context("expected", self.dimension())
                    .with_context("actual", sample.len()),
            ));
        }
        self.count += 1;
        let sample = DVector::from_column_slice(sample);
        let delta = &sample - &self.mean;
        self.mean += &delta / self.count as f64;
        let delta_after = &sample - &self.mean;
        self.comoment += &delta * delta_after.transpose();
        Ok(())
    }

    /// Current running mean.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Sample covariance; all zeros until two observations have been seen.
    pub fn covariance(&self) -> DMatrix<f64> {
        if self.count < 2 {
            return DMatrix::zeros(self.dimension(), self.dimension());
        }
        let mut covariance = &self.comoment / (self.count - 1) as f64;
        // Welford's outer product is only symmetric up to rounding.
        covariance = (&covariance + covariance.transpose()) * 0.5;
        covariance
    }

    /// Sample variance of coordinate `index`.
    pub fn variance(&self, index: usize) -> f64 {
        if self.count < 2 || index >= self.dimension() {
            return 0.0;
        }
        self.comoment[(index, index)] / (self.count - 1) as f64
    }

    /// Forgets every observation.
    pub fn reset(&mut self) {
        *self = Self::new(self.dimension());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_matches_hand_computation() {
        let moments = describe(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("non-empty");
        assert!((moments.mean - 5.0).abs() < 1e-12);
        assert!((moments.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!(describe(&[]).is_none());
        assert_eq!(describe(&[3.5]).map(|m| m.std_dev), Some(0.0));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let mut moments = RunningMoments::new(2);
        assert!(moments.update(&[1.0]).is_err());
        assert_eq!(moments.count(), 0);
    }
}
