//! Report Building
//!
//! Joins execution results with their statistics into a [`Report`].

use super::execution::{BenchExecutionResult, ExecutionConfig};
use super::metadata::build_report_meta;
use super::statistics::ScoreStatistics;
use streambench_report::{
    BenchmarkMetrics, BenchmarkReportResult, BenchmarkStatus, FailureInfo, ForkSummary,
    PercentileMetrics, Report, ReportSummary,
};

/// Build a complete Report from execution results
///
/// `stats` must be in the same order as `results` (as returned by
/// `compute_statistics`).
pub fn build_report(
    results: &[BenchExecutionResult],
    stats: &[Option<ScoreStatistics>],
    config: &ExecutionConfig,
    total_duration_ms: f64,
) -> Report {
    let mode = config.benchmark.mode;
    let unit = mode.unit_label(config.time_unit);

    let mut benchmark_results = Vec::with_capacity(results.len());
    let mut summary = ReportSummary {
        total_benchmarks: results.len(),
        total_duration_ms,
        ..Default::default()
    };

    for (result, stats) in results.iter().zip(stats) {
        match result.status {
            BenchmarkStatus::Passed => summary.passed += 1,
            BenchmarkStatus::Partial => summary.partial += 1,
            BenchmarkStatus::ConfigError => summary.config_errors += 1,
            BenchmarkStatus::Crashed => summary.crashed += 1,
        }

        let metrics = stats.as_ref().map(|s| {
            let mut metrics = BenchmarkMetrics::from(&s.summary);
            metrics.percentiles = s.percentiles.as_ref().map(PercentileMetrics::from);
            metrics
        });

        let failure = result.error_message.as_ref().map(|message| FailureInfo {
            kind: result
                .failure_kind
                .clone()
                .unwrap_or_else(|| "crash".to_string()),
            message: message.clone(),
        });

        let mut notes = result.notes.clone();
        if let Some(s) = stats {
            if s.summary.discarded > 0 {
                notes.push(format!(
                    "{} non-finite scores ignored",
                    s.summary.discarded
                ));
            }
        }

        benchmark_results.push(BenchmarkReportResult {
            id: result.benchmark_id.clone(),
            group: result.group.clone(),
            mode: mode.label().to_string(),
            unit: unit.clone(),
            status: result.status,
            forks: ForkSummary {
                requested: result.forks_requested,
                completed: result.forks_completed,
                timed_out: result.forks_timed_out,
            },
            truncated: result.truncated,
            metrics,
            failure,
            notes,
        });
    }

    Report {
        meta: build_report_meta(config),
        results: benchmark_results,
        summary,
    }
}
