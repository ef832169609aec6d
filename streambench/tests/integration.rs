//! Integration tests for streambench
//!
//! These tests drive whole trials in-process; forked runs are covered in
//! `tests/fork.rs`.

use streambench::{
    BenchmarkConfig, BenchmarkDef, Hooks, IterationLimit, Mode, Registry, Sample, SetupError,
    TimeUnit, TrialError, compute_summary, register_stream_benchmarks, run_trial,
};
use streambench_cli::{ExecutionConfig, Executor, build_report, compute_statistics};

fn quick_config(warmup: u32, measurement: u32) -> BenchmarkConfig {
    BenchmarkConfig {
        warmup_iterations: warmup,
        measurement_iterations: measurement,
        warmup_limit: IterationLimit::Invocations { count: 2 },
        measurement_limit: IterationLimit::Invocations { count: 2 },
        ..Default::default()
    }
}

fn stream_registry() -> Registry {
    let mut registry = Registry::new();
    register_stream_benchmarks(&mut registry).unwrap();
    registry
}

/// Warmup iterations are not recorded; every measurement iteration is
#[test]
fn test_warmup_excluded_from_samples() {
    let registry = stream_registry();
    let def = registry.get("filter_map_sequential").unwrap();

    let mut samples: Vec<Sample> = Vec::new();
    let outcome = run_trial(def, &quick_config(5, 10), &mut samples).unwrap();

    assert_eq!(samples.len(), 10);
    assert_eq!(outcome.warmup.iterations, 5);
    assert_eq!(outcome.measured_iterations, 10);
    assert!(!outcome.truncated);
    assert!(samples.iter().all(|s| s.operations == 2));
}

/// Each thread runs its own invocations; the iteration covers all of them
#[test]
fn test_multi_threaded_trial() {
    let registry = stream_registry();
    let def = registry.get("filter_map_parallel").unwrap();
    let config = BenchmarkConfig {
        threads: 2,
        ..quick_config(1, 3)
    };

    let mut samples: Vec<Sample> = Vec::new();
    let outcome = run_trial(def, &config, &mut samples).unwrap();

    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|s| s.operations == 4));
    assert_eq!(outcome.invocations, 12);
}

/// Sample mode records one sample per invocation
#[test]
fn test_sample_mode_records_invocations() {
    let registry = stream_registry();
    let def = registry.get("filter_then_map_sequential").unwrap();
    let config = BenchmarkConfig {
        mode: Mode::SampleTime,
        ..quick_config(1, 3)
    };

    let mut samples: Vec<Sample> = Vec::new();
    run_trial(def, &config, &mut samples).unwrap();

    assert_eq!(samples.len(), 6);
    assert!(samples.iter().all(|s| s.operations == 1));
}

/// A failing setup is a setup error and nothing is measured
#[test]
fn test_setup_failure_aborts_trial() {
    let def = BenchmarkDef::new(
        "broken",
        Hooks::new(|| Ok(Vec::<i64>::new()), |v| v.len())
            .with_setup(|_| Err(SetupError::new("input missing"))),
    );

    let mut samples: Vec<Sample> = Vec::new();
    let err = run_trial(&def, &quick_config(1, 3), &mut samples).unwrap_err();

    assert!(err.is_setup_failure());
    assert!(samples.is_empty());
}

/// A panicking workload aborts the trial instead of the process
#[test]
fn test_workload_panic_is_caught() {
    let def = BenchmarkDef::new(
        "panics",
        Hooks::new(|| Ok(()), |_| -> u64 { panic!("workload exploded") }),
    );

    let mut samples: Vec<Sample> = Vec::new();
    let err = run_trial(&def, &quick_config(0, 3), &mut samples).unwrap_err();

    assert!(matches!(err, TrialError::Panic { .. }));
    assert!(err.to_string().contains("workload exploded"));
}

/// Identical scores give a zero-width interval
#[test]
fn test_identical_scores_zero_width_interval() {
    let summary = compute_summary(&[10.0, 10.0, 10.0], 0.999);
    assert_eq!(summary.mean, 10.0);
    assert_eq!(summary.std_dev, 0.0);
    assert_eq!(summary.confidence_interval.lower, 10.0);
    assert_eq!(summary.confidence_interval.upper, 10.0);
}

/// One sample has a mean but no spread
#[test]
fn test_single_score_has_no_spread() {
    let summary = compute_summary(&[42.0], 0.999);
    assert_eq!(summary.mean, 42.0);
    assert!(summary.std_dev.is_nan());
    assert!(summary.confidence_interval.lower.is_nan());
    assert!(summary.confidence_interval.upper.is_nan());
}

/// In-process run of all four benchmarks through statistics and report
#[test]
fn test_in_process_run_reports_all_benchmarks() {
    let registry = stream_registry();
    let benchmarks: Vec<&BenchmarkDef> = registry.iter().collect();
    let config = ExecutionConfig {
        benchmark: quick_config(1, 4),
        forks: 0,
        time_unit: TimeUnit::Milliseconds,
        ..Default::default()
    };

    let results = Executor::new(config.clone()).execute(&benchmarks);
    let stats = compute_statistics(&results, &config);
    let report = build_report(&results, &stats, &config, 0.0);

    assert_eq!(report.summary.total_benchmarks, 4);
    assert_eq!(report.summary.passed, 4);
    assert!(!report.has_failures());
    for result in &report.results {
        assert_eq!(result.unit, "ops/ms");
        let metrics = result.metrics.as_ref().unwrap();
        assert_eq!(metrics.samples, 4);
        assert!(metrics.score > 0.0);
        assert!(metrics.min <= metrics.score && metrics.score <= metrics.max);
    }
}
