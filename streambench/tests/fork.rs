//! Fork isolation tests
//!
//! These spawn the real benchmark binaries as workers, so every frame crosses
//! an actual pipe pair on fd 3/4.

use serde_json::Value;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use streambench::{BenchmarkConfig, IterationLimit};
use streambench_cli::{ForkStatus, SupervisorError, WorkerHandle};

const STREAMBENCH: &str = env!("CARGO_BIN_EXE_streambench");
const FAULTS: &str = env!("CARGO_BIN_EXE_streambench-faults");

/// Generous upper bound so a hung worker fails the test instead of stalling it
const HARD_TIMEOUT: Duration = Duration::from_secs(60);

fn counted_config(warmup: u32, measurement: u32) -> BenchmarkConfig {
    BenchmarkConfig {
        warmup_iterations: warmup,
        measurement_iterations: measurement,
        warmup_limit: IterationLimit::Invocations { count: 2 },
        measurement_limit: IterationLimit::Invocations { count: 2 },
        ..Default::default()
    }
}

fn spawn(binary: &str) -> WorkerHandle {
    WorkerHandle::spawn_binary(Path::new(binary)).unwrap()
}

#[test]
fn test_worker_handshake() {
    let worker = spawn(STREAMBENCH);
    let caps = worker.capabilities().unwrap();
    assert_eq!(caps.protocol_version, streambench_ipc::PROTOCOL_VERSION);
    assert!(caps.cpu_count >= 1);
    worker.shutdown().unwrap();
}

#[test]
fn test_fork_records_only_measurement_samples() {
    let mut worker = spawn(STREAMBENCH);
    let outcome = worker
        .run_fork("filter_map_sequential", 1, &counted_config(5, 10), Some(HARD_TIMEOUT))
        .unwrap();

    assert_eq!(outcome.status, ForkStatus::Completed { truncated: false });
    assert_eq!(outcome.fork, 1);
    assert_eq!(outcome.samples.len(), 10);
    assert_eq!(outcome.measured_iterations, 10);
    assert!(outcome.samples.iter().all(|s| s.operations == 2));
    worker.shutdown().unwrap();
}

#[test]
fn test_multi_threaded_fork() {
    let mut worker = spawn(STREAMBENCH);
    let config = BenchmarkConfig {
        threads: 2,
        ..counted_config(1, 3)
    };
    let outcome = worker
        .run_fork("filter_map_parallel", 2, &config, Some(HARD_TIMEOUT))
        .unwrap();

    assert_eq!(outcome.status, ForkStatus::Completed { truncated: false });
    assert_eq!(outcome.samples.len(), 3);
    assert!(outcome.samples.iter().all(|s| s.operations == 4));
    worker.shutdown().unwrap();
}

#[test]
fn test_unknown_benchmark_is_setup_failure() {
    let mut worker = spawn(STREAMBENCH);
    let outcome = worker
        .run_fork("no_such_benchmark", 1, &counted_config(1, 3), Some(HARD_TIMEOUT))
        .unwrap();

    match outcome.status {
        ForkStatus::SetupFailed { message } => assert!(message.contains("no_such_benchmark")),
        other => panic!("expected setup failure, got {other:?}"),
    }
    assert!(outcome.samples.is_empty());
    worker.shutdown().unwrap();
}

#[test]
fn test_failing_setup_is_setup_failure() {
    let mut worker = spawn(FAULTS);
    let outcome = worker
        .run_fork("setup_fails", 1, &counted_config(1, 3), Some(HARD_TIMEOUT))
        .unwrap();

    match outcome.status {
        ForkStatus::SetupFailed { message } => assert!(message.contains("input missing")),
        other => panic!("expected setup failure, got {other:?}"),
    }
    worker.shutdown().unwrap();
}

#[test]
fn test_workload_panic_crashes_fork() {
    let mut worker = spawn(FAULTS);
    let outcome = worker
        .run_fork("panics", 1, &counted_config(0, 3), Some(HARD_TIMEOUT))
        .unwrap();

    match outcome.status {
        ForkStatus::Crashed { message } => assert!(message.contains("workload exploded")),
        other => panic!("expected crash, got {other:?}"),
    }
    assert!(outcome.samples.is_empty());

    // The panic was caught; the worker is still there to shut down
    assert!(worker.is_alive());
    worker.shutdown().unwrap();
}

#[test]
fn test_aborting_worker_is_detected() {
    let mut worker = spawn(FAULTS);
    let err = worker
        .run_fork("aborts", 1, &counted_config(0, 3), Some(HARD_TIMEOUT))
        .unwrap_err();

    assert!(matches!(err, SupervisorError::WorkerCrashed(_)));
}

#[test]
fn test_trial_timeout_truncates_fork() {
    let mut worker = spawn(STREAMBENCH);
    let config = BenchmarkConfig {
        measurement_iterations: 1_000_000,
        measurement_limit: IterationLimit::Invocations { count: 1 },
        timeout_ns: 200_000_000,
        ..counted_config(0, 1)
    };
    let outcome = worker
        .run_fork("filter_map_sequential", 1, &config, Some(HARD_TIMEOUT))
        .unwrap();

    assert_eq!(outcome.status, ForkStatus::Completed { truncated: true });
    assert!(outcome.measured_iterations < 1_000_000);
    assert_eq!(outcome.samples.len(), outcome.measured_iterations as usize);
    worker.shutdown().unwrap();
}

fn run_json(binary: &str, args: &[&str]) -> (Option<i32>, Value) {
    let output = Command::new(binary)
        .args(args)
        .args(["--format", "json"])
        .output()
        .unwrap();
    let report: Value = serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "no JSON report ({e}); stderr:\n{}",
            String::from_utf8_lossy(&output.stderr)
        )
    });
    (output.status.code(), report)
}

fn result_for<'a>(report: &'a Value, id: &str) -> &'a Value {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == id)
        .unwrap()
}

#[test]
fn test_forked_run_end_to_end() {
    let (code, report) = run_json(
        STREAMBENCH,
        &[
            "-f", "2", "-i", "3", "-wi", "1", "--ops", "3", "-t", "2", "-tu", "ms",
            "^filter_map_sequential$",
        ],
    );

    assert_eq!(code, Some(0));
    assert_eq!(report["summary"]["passed"], 1);
    let result = result_for(&report, "filter_map_sequential");
    assert_eq!(result["status"], "passed");
    assert_eq!(result["unit"], "ops/ms");
    assert_eq!(result["forks"]["completed"], 2);
    // Three iterations per fork, two forks
    assert_eq!(result["metrics"]["samples"], 6);
}

#[test]
fn test_failing_benchmarks_do_not_sink_the_run() {
    let (code, report) = run_json(
        FAULTS,
        &[
            "-f", "2", "-i", "2", "-wi", "0", "--ops", "2",
            "^(panics|setup_fails|filter_map_sequential)$",
        ],
    );

    assert_eq!(code, Some(1));
    assert_eq!(report["summary"]["total_benchmarks"], 3);

    assert_eq!(result_for(&report, "filter_map_sequential")["status"], "passed");

    let panics = result_for(&report, "panics");
    assert_eq!(panics["status"], "crashed");
    assert_eq!(panics["forks"]["completed"], 0);

    let setup = result_for(&report, "setup_fails");
    assert_eq!(setup["status"], "config-error");
    assert!(setup["failure"]["message"]
        .as_str()
        .unwrap()
        .contains("input missing"));
}
