//! Benchmark Execution
//!
//! ## Execution Modes
//!
//! - **Forked (`IsolatedExecutor`)**: every fork is a fresh worker process
//!   driven by the [`Supervisor`]. A crash or hang takes down one fork only.
//!
//! - **In-process (`Executor`)**: `--forks 0`. One trial per benchmark in the
//!   runner itself. Panics are still caught, but state leaks between
//!   benchmarks. Meant for debugging.
//!
//! Both produce one [`BenchExecutionResult`] per benchmark, with the fork
//! outcomes already folded into a status.

use crate::supervisor::{ForkOutcome, ForkStatus, Supervisor};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use streambench_core::{BenchmarkDef, run_trial};
use streambench_ipc::{BenchmarkConfig, Sample, TimeUnit};
use streambench_report::BenchmarkStatus;
use tracing::warn;

/// Configuration for benchmark execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Per-trial configuration handed to every fork
    pub benchmark: BenchmarkConfig,
    /// Forks per benchmark (0 = in-process)
    pub forks: u32,
    /// Benchmarks run concurrently
    pub jobs: usize,
    /// Unit scores are reported in
    pub time_unit: TimeUnit,
    /// Confidence level for intervals
    pub confidence_level: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            benchmark: BenchmarkConfig::default(),
            forks: 1,
            jobs: 1,
            time_unit: TimeUnit::Seconds,
            confidence_level: streambench_stats::DEFAULT_CONFIDENCE_LEVEL,
        }
    }
}

/// Result from executing a single benchmark
#[derive(Debug)]
pub struct BenchExecutionResult {
    /// Benchmark id
    pub benchmark_id: String,
    /// Group the benchmark belongs to
    pub group: String,
    /// Status after folding all forks
    pub status: BenchmarkStatus,
    /// Samples of every fork that contributed
    pub samples: Vec<Sample>,
    /// Forks asked for
    pub forks_requested: u32,
    /// Forks that ran their trial to the end
    pub forks_completed: u32,
    /// Forks killed at the hard deadline
    pub forks_timed_out: u32,
    /// Whether any fork stopped measuring early
    pub truncated: bool,
    /// `setup` or `crash` when the benchmark failed
    pub failure_kind: Option<String>,
    /// Message of the failure that decided the status
    pub error_message: Option<String>,
    /// Per-fork remarks for the report
    pub notes: Vec<String>,
    /// Wall time spent on the benchmark
    pub duration_ns: u64,
}

/// Fold per-fork outcomes into one benchmark result.
///
/// - any setup failure makes the whole benchmark a configuration error
/// - samples of completed and timed-out forks are kept, crashed forks add none
/// - no samples at all means the benchmark crashed
/// - otherwise it passed if every requested fork completed, else it is partial
pub fn summarize_forks(
    bench: &BenchmarkDef,
    forks_requested: u32,
    outcomes: Vec<ForkOutcome>,
    duration_ns: u64,
) -> BenchExecutionResult {
    let mut samples = Vec::new();
    let mut forks_completed = 0;
    let mut forks_timed_out = 0;
    let mut truncated = false;
    let mut setup_failure = None;
    let mut last_crash = None;
    let mut notes = Vec::new();

    for outcome in outcomes {
        match outcome.status {
            ForkStatus::Completed { truncated: cut } => {
                forks_completed += 1;
                if cut {
                    truncated = true;
                    notes.push(format!(
                        "fork {} truncated by timeout after {} iterations",
                        outcome.fork, outcome.measured_iterations
                    ));
                }
                samples.extend(outcome.samples);
            }
            ForkStatus::TimedOut => {
                forks_timed_out += 1;
                truncated = true;
                notes.push(format!(
                    "fork {} timed out, kept {} samples",
                    outcome.fork,
                    outcome.samples.len()
                ));
                samples.extend(outcome.samples);
            }
            ForkStatus::SetupFailed { message } => {
                setup_failure.get_or_insert(message);
            }
            ForkStatus::Crashed { message } => {
                notes.push(format!("fork {} crashed: {}", outcome.fork, message));
                last_crash = Some(message);
            }
        }
    }

    let (status, failure_kind, error_message) = if let Some(message) = setup_failure {
        samples.clear();
        (
            BenchmarkStatus::ConfigError,
            Some("setup".to_string()),
            Some(message),
        )
    } else if samples.is_empty() {
        let message = last_crash.unwrap_or_else(|| "no samples recorded".to_string());
        (
            BenchmarkStatus::Crashed,
            Some("crash".to_string()),
            Some(message),
        )
    } else if forks_completed == forks_requested {
        (BenchmarkStatus::Passed, None, None)
    } else {
        (BenchmarkStatus::Partial, None, None)
    };

    BenchExecutionResult {
        benchmark_id: bench.id().to_string(),
        group: bench.group().to_string(),
        status,
        samples,
        forks_requested,
        forks_completed,
        forks_timed_out,
        truncated,
        failure_kind,
        error_message,
        notes,
        duration_ns,
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Execute benchmarks in the current process (`--forks 0`)
pub struct Executor {
    config: ExecutionConfig,
}

impl Executor {
    /// Create a new in-process executor
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Execute all provided benchmarks, one trial each
    pub fn execute(&self, benchmarks: &[&BenchmarkDef]) -> Vec<BenchExecutionResult> {
        let pb = progress_bar(benchmarks.len());
        let mut results = Vec::with_capacity(benchmarks.len());

        for bench in benchmarks {
            pb.set_message(bench.id().to_string());
            results.push(self.execute_single(bench));
            pb.inc(1);
        }

        pb.finish_with_message("Complete");
        results
    }

    /// Execute a single benchmark
    fn execute_single(&self, bench: &BenchmarkDef) -> BenchExecutionResult {
        let start = Instant::now();
        let mut samples: Vec<Sample> = Vec::new();

        let outcome = match run_trial(bench, &self.config.benchmark, &mut samples) {
            Ok(trial) => ForkOutcome {
                fork: 0,
                status: ForkStatus::Completed {
                    truncated: trial.truncated,
                },
                samples,
                invocations: trial.invocations,
                measured_iterations: trial.measured_iterations,
            },
            Err(e) => {
                let message = e.to_string();
                let status = if e.is_setup_failure() {
                    ForkStatus::SetupFailed { message }
                } else {
                    warn!(bench_id = bench.id(), "trial failed: {message}");
                    ForkStatus::Crashed { message }
                };
                ForkOutcome {
                    fork: 0,
                    status,
                    samples: Vec::new(),
                    invocations: 0,
                    measured_iterations: 0,
                }
            }
        };

        let duration_ns = start.elapsed().as_nanos() as u64;
        let mut result = summarize_forks(bench, 1, vec![outcome], duration_ns);
        result.notes.push("ran in-process (no fork)".to_string());
        result
    }
}

/// Executor that runs every fork in a fresh worker process
pub struct IsolatedExecutor {
    config: ExecutionConfig,
}

impl IsolatedExecutor {
    /// Create a new isolated executor
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Execute all provided benchmarks in forked worker processes
    pub fn execute(&self, benchmarks: &[&BenchmarkDef]) -> Vec<BenchExecutionResult> {
        let pb = progress_bar(benchmarks.len());
        pb.set_message("Starting forks...");

        let supervisor = Supervisor::new(
            self.config.benchmark.clone(),
            self.config.forks,
            self.config.jobs,
        );

        let start = Instant::now();
        let outcomes = supervisor.run_all(benchmarks, |bench| {
            pb.set_message(bench.id().to_string());
            pb.inc(1);
        });
        let duration_ns = start.elapsed().as_nanos() as u64;

        let results = match outcomes {
            Ok(outcomes) => benchmarks
                .iter()
                .zip(outcomes)
                .map(|(bench, forks)| {
                    summarize_forks(bench, self.config.forks, forks, duration_ns)
                })
                .collect(),
            Err(e) => benchmarks
                .iter()
                .map(|bench| {
                    let crash = ForkOutcome {
                        fork: 1,
                        status: ForkStatus::Crashed {
                            message: format!("Supervisor error: {}", e),
                        },
                        samples: Vec::new(),
                        invocations: 0,
                        measured_iterations: 0,
                    };
                    summarize_forks(bench, self.config.forks, vec![crash], 0)
                })
                .collect(),
        };

        pb.finish_with_message("Complete");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streambench_core::{Hooks, SetupError};
    use streambench_ipc::IterationLimit;

    fn bench() -> BenchmarkDef {
        BenchmarkDef::new("noop", Hooks::new(|| Ok(0u64), |n| n + 1))
    }

    fn completed(fork: u32, samples: usize) -> ForkOutcome {
        ForkOutcome {
            fork,
            status: ForkStatus::Completed { truncated: false },
            samples: vec![Sample::new(1_000, 10); samples],
            invocations: samples as u64 * 10,
            measured_iterations: samples as u32,
        }
    }

    fn crashed(fork: u32) -> ForkOutcome {
        ForkOutcome {
            fork,
            status: ForkStatus::Crashed {
                message: "boom".to_string(),
            },
            samples: Vec::new(),
            invocations: 0,
            measured_iterations: 0,
        }
    }

    #[test]
    fn test_all_forks_completed_passes() {
        let result = summarize_forks(&bench(), 2, vec![completed(1, 5), completed(2, 5)], 0);
        assert_eq!(result.status, BenchmarkStatus::Passed);
        assert_eq!(result.samples.len(), 10);
        assert_eq!(result.forks_completed, 2);
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_crashed_fork_reduces_fork_count() {
        let result = summarize_forks(&bench(), 3, vec![completed(1, 5), crashed(2), completed(3, 5)], 0);
        assert_eq!(result.status, BenchmarkStatus::Partial);
        assert_eq!(result.forks_completed, 2);
        assert_eq!(result.samples.len(), 10);
        assert_eq!(result.notes, vec!["fork 2 crashed: boom".to_string()]);
    }

    #[test]
    fn test_no_samples_is_crash() {
        let result = summarize_forks(&bench(), 1, vec![crashed(1)], 0);
        assert_eq!(result.status, BenchmarkStatus::Crashed);
        assert_eq!(result.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_setup_failure_is_config_error() {
        let failed = ForkOutcome {
            fork: 1,
            status: ForkStatus::SetupFailed {
                message: "no input".to_string(),
            },
            samples: Vec::new(),
            invocations: 0,
            measured_iterations: 0,
        };
        let result = summarize_forks(&bench(), 3, vec![failed], 0);
        assert_eq!(result.status, BenchmarkStatus::ConfigError);
        assert_eq!(result.failure_kind.as_deref(), Some("setup"));
        assert!(result.samples.is_empty());
    }

    #[test]
    fn test_timed_out_fork_keeps_samples() {
        let timed_out = ForkOutcome {
            fork: 2,
            status: ForkStatus::TimedOut,
            samples: vec![Sample::new(1_000, 10); 3],
            invocations: 0,
            measured_iterations: 0,
        };
        let result = summarize_forks(&bench(), 2, vec![completed(1, 5), timed_out], 0);
        assert_eq!(result.status, BenchmarkStatus::Partial);
        assert_eq!(result.samples.len(), 8);
        assert_eq!(result.forks_timed_out, 1);
        assert!(result.truncated);
    }

    fn quick_config() -> ExecutionConfig {
        ExecutionConfig {
            benchmark: BenchmarkConfig {
                warmup_iterations: 1,
                measurement_iterations: 3,
                warmup_limit: IterationLimit::Invocations { count: 5 },
                measurement_limit: IterationLimit::Invocations { count: 5 },
                ..Default::default()
            },
            forks: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_in_process_executor_records_samples() {
        let def = bench();
        let results = Executor::new(quick_config()).execute(&[&def]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, BenchmarkStatus::Passed);
        assert_eq!(results[0].samples.len(), 3);
    }

    #[test]
    fn test_in_process_setup_failure() {
        let def = BenchmarkDef::new(
            "broken",
            Hooks::new(|| Ok(0u64), |n| *n)
                .with_setup(|_| Err(SetupError::new("missing fixture"))),
        );
        let results = Executor::new(quick_config()).execute(&[&def]);
        assert_eq!(results[0].status, BenchmarkStatus::ConfigError);
        assert!(
            results[0]
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("missing fixture"))
        );
    }
}
