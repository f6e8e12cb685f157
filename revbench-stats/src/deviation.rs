//! Deviation Screening
//!
//! Per-sample z-value and percentage deviation from the sample mean, plus the
//! threshold screen that marks samples as rejected.
//!
//! Both ratios have explicit zero rules:
//! - z-value is 0 when the standard deviation is 0
//! - deviation is 0 when the mean is 0

use crate::distribution::Distribution;

/// Deviation of one sample from its distribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleDeviation {
    /// Standard score of the sample
    pub z_value: f64,
    /// Signed deviation from the mean, in percent
    pub deviation: f64,
    /// Whether `|deviation|` exceeded the rejection threshold
    pub rejected: bool,
}

/// Standard score of `value`. Zero-variance samples score 0 everywhere.
#[inline]
pub fn z_value(value: f64, mean: f64, stdev: f64) -> f64 {
    if stdev == 0.0 {
        return 0.0;
    }
    (value - mean) / stdev
}

/// Signed percentage deviation of `value` from `mean`. A zero mean yields 0.
#[inline]
pub fn deviation_percent(value: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        return 0.0;
    }
    (value - mean) / mean * 100.0
}

/// Screen every sample against the distribution.
///
/// `threshold` is a percentage; a sample is rejected when `|deviation| > threshold`.
/// A threshold of 0 (or below) disables rejection.
pub fn screen_deviations(
    samples: &[f64],
    distribution: &Distribution,
    threshold: f64,
) -> Vec<SampleDeviation> {
    samples
        .iter()
        .map(|&value| {
            let deviation = deviation_percent(value, distribution.mean);
            SampleDeviation {
                z_value: z_value(value, distribution.mean, distribution.stdev),
                deviation,
                rejected: threshold > 0.0 && deviation.abs() > threshold,
            }
        })
        .collect()
}
