//! Summary Statistics
//!
//! Aggregates the scores of one benchmark across all iterations of all
//! completed forks:
//! - mean of the scores
//! - sample standard deviation (N-1 denominator)
//! - `mean ± t(level, N-1) · stddev / sqrt(N)` confidence interval
//!
//! With N <= 1 the spread is undefined and reported as NaN.

use crate::distribution::students_t_quantile;

/// Confidence interval bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Confidence level in `(0, 1)`
    pub level: f64,
}

/// Summary statistics for one benchmark
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStatistics {
    /// Number of finite scores aggregated
    pub sample_count: usize,
    /// Non-finite scores that were skipped
    pub discarded: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Smallest score
    pub min: f64,
    /// Largest score
    pub max: f64,
    /// Confidence interval around the mean
    pub confidence_interval: ConfidenceInterval,
}

impl SummaryStatistics {
    /// Half-width of the confidence interval (the "± error")
    pub fn error(&self) -> f64 {
        (self.confidence_interval.upper - self.confidence_interval.lower) / 2.0
    }
}

/// Compute summary statistics for a set of scores
pub fn compute_summary(scores: &[f64], confidence_level: f64) -> SummaryStatistics {
    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    let discarded = scores.len() - finite.len();
    let n = finite.len();

    if n == 0 {
        return SummaryStatistics {
            sample_count: 0,
            discarded,
            mean: f64::NAN,
            std_dev: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            confidence_interval: ConfidenceInterval {
                lower: f64::NAN,
                upper: f64::NAN,
                level: confidence_level,
            },
        };
    }

    let mean = finite.iter().sum::<f64>() / n as f64;
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (std_dev, confidence_interval) = if n < 2 {
        (
            f64::NAN,
            ConfidenceInterval {
                lower: f64::NAN,
                upper: f64::NAN,
                level: confidence_level,
            },
        )
    } else {
        let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std_dev = variance.sqrt();
        let margin = if std_dev == 0.0 {
            0.0
        } else {
            students_t_quantile(confidence_level, (n - 1) as f64) * std_dev / (n as f64).sqrt()
        };
        (
            std_dev,
            ConfidenceInterval {
                lower: mean - margin,
                upper: mean + margin,
                level: confidence_level,
            },
        )
    };

    SummaryStatistics {
        sample_count: n,
        discarded,
        mean,
        std_dev,
        min,
        max,
        confidence_interval,
    }
}
