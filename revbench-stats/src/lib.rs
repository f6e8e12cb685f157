#![warn(missing_docs)]
//! revbench Statistical Engine
//!
//! Reduces a sample of per-revolution times into comparable statistics:
//! - Distribution summary (min, max, mean, median, population stdev, rstdev)
//! - Per-sample z-value and signed percentage deviation from the mean
//! - Threshold-based rejection screening

mod deviation;
mod distribution;
mod percentiles;

pub use deviation::{SampleDeviation, deviation_percent, screen_deviations, z_value};
pub use distribution::{Distribution, compute_distribution};
pub use percentiles::compute_percentile;

/// Retry threshold value that disables rejection screening
pub const REJECTION_DISABLED: f64 = 0.0;
