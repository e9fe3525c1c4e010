use serde::{Deserialize, Serialize};

/// Fixed-bin histogram of an ensemble series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// Center of every bin.
    pub centers: Vec<f64>,
    /// Number of values per bin.
    pub counts: Vec<u64>,
    /// Common bin width; zero when every value is identical.
    pub bin_width: f64,
}

impl Histogram {
    /// Bins `values` into `bins` equal-width bins spanning their range.
    ///
    /// The last bin is closed on the right. A constant series yields a single
    /// bin of zero width holding every value; an empty series yields no bins.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || bins == 0 {
            return Self {
                centers: Vec::new(),
                counts: Vec::new(),
                bin_width: 0.0,
            };
        }
        let (min, max) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if max == min {
            return Self {
                centers: vec![min],
                counts: vec![finite.len() as u64],
                bin_width: 0.0,
            };
        }
        let width = (max - min) / bins as f64;
        let centers = (0..bins).map(|bin| min + (bin as f64 + 0.5) * width).collect();
        let mut counts = vec![0u64; bins];
        for value in finite {
            let bin = (((value - min) / width).floor() as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Self {
            centers,
            counts,
            bin_width: width,
        }
    }

    /// Total number of binned values.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
