//! Distribution Summary
//!
//! Summary of a complete sample of per-revolution times. Unlike an outlier-cleaning
//! summary, every value takes part: rejection is advisory and never shrinks the sample.
//! The standard deviation is the population deviation (divisor `n`).

use crate::percentiles::compute_percentile;
use serde::{Deserialize, Serialize};

/// Summary statistics of one variant's sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    /// Number of values in the sample
    pub count: usize,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Sum of all values
    pub sum: f64,
    /// Arithmetic mean
    pub mean: f64,
    /// Median (interpolated)
    pub median: f64,
    /// Population variance
    pub variance: f64,
    /// Population standard deviation
    pub stdev: f64,
    /// Relative standard deviation as a percentage of the mean
    pub rstdev: f64,
}

impl Distribution {
    /// Named statistics in a stable order, for flat attribute serialization.
    pub fn named_values(&self) -> [(&'static str, f64); 8] {
        [
            ("min", self.min),
            ("max", self.max),
            ("sum", self.sum),
            ("mean", self.mean),
            ("median", self.median),
            ("variance", self.variance),
            ("stdev", self.stdev),
            ("rstdev", self.rstdev),
        ]
    }
}

/// Compute the distribution of a sample.
///
/// Returns `None` for an empty sample: there is nothing to summarize.
pub fn compute_distribution(samples: &[f64]) -> Option<Distribution> {
    if samples.is_empty() {
        return None;
    }

    let count = samples.len();
    let sum: f64 = samples.iter().sum();
    let mean = sum / count as f64;

    let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
    let stdev = variance.sqrt();

    let min = samples
        .iter()
        .cloned()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);
    let max = samples
        .iter()
        .cloned()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    let rstdev = if mean == 0.0 {
        0.0
    } else {
        stdev / mean * 100.0
    };

    Some(Distribution {
        count,
        min,
        max,
        sum,
        mean,
        median: compute_percentile(samples, 50.0),
        variance,
        stdev,
        rstdev,
    })
}
