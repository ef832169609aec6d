#![warn(missing_docs)]
//! streambench Statistical Engine
//!
//! Turns per-sample scores into the figures a results table needs:
//! - Mean, sample standard deviation (N-1), min and max
//! - Student-t confidence interval around the mean
//! - Percentiles for sample-time distributions
//!
//! Scores are plain `f64`s; converting raw durations into scores is the
//! caller's business.

mod distribution;
mod percentiles;
mod summary;

pub use distribution::students_t_quantile;
pub use percentiles::{Percentiles, compute_percentile, compute_percentiles};
pub use summary::{ConfidenceInterval, SummaryStatistics, compute_summary};

/// Default confidence level (99.9%)
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.999;
