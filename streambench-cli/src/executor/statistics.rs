//! Statistics Computation
//!
//! Turns each benchmark's raw samples into scores for the configured mode
//! and unit, then summarizes them. Benchmarks are independent, so the work
//! is spread across benchmarks with Rayon.

use super::execution::{BenchExecutionResult, ExecutionConfig};
use rayon::prelude::*;
use streambench_ipc::{Mode, Sample, TimeUnit};
use streambench_stats::{Percentiles, SummaryStatistics, compute_percentiles, compute_summary};

/// Aggregated scores of one benchmark
#[derive(Debug, Clone)]
pub struct ScoreStatistics {
    /// Mean, spread and confidence interval of the scores
    pub summary: SummaryStatistics,
    /// Only computed in sample-time mode
    pub percentiles: Option<Percentiles>,
}

/// Convert samples to scores for `mode` in `unit`
pub fn sample_scores(samples: &[Sample], mode: Mode, unit: TimeUnit) -> Vec<f64> {
    samples.iter().map(|s| s.score(mode, unit)).collect()
}

/// Compute statistics for benchmark results (parallelized with Rayon)
///
/// Returns `None` for benchmarks without samples (configuration errors and
/// crashes), in the same order as `results`.
pub fn compute_statistics(
    results: &[BenchExecutionResult],
    config: &ExecutionConfig,
) -> Vec<Option<ScoreStatistics>> {
    let mode = config.benchmark.mode;

    results
        .par_iter()
        .map(|r| {
            if r.samples.is_empty() {
                return None;
            }
            let scores = sample_scores(&r.samples, mode, config.time_unit);
            let summary = compute_summary(&scores, config.confidence_level);
            let percentiles = (mode == Mode::SampleTime).then(|| compute_percentiles(&scores));
            Some(ScoreStatistics {
                summary,
                percentiles,
            })
        })
        .collect()
}
