#![warn(missing_docs)]
//! streambench CLI Library
//!
//! Command-line front end for a benchmark binary. The binary builds a
//! [`Registry`] of its benchmarks and hands it to [`run`], which either runs
//! as the supervisor (parse flags, plan, fork, aggregate, report) or, when
//! re-executed with `--worker`, as a fork worker serving one trial.
//!
//! # Example
//!
//! ```ignore
//! use streambench_core::{BenchmarkDef, Hooks, Registry};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = Registry::new();
//!     registry.register(BenchmarkDef::new("sum", Hooks::new(|| Ok(vec![1u64; 1024]), |v| v.iter().sum::<u64>())))?;
//!     streambench_cli::run(registry)
//! }
//! ```

mod config;
mod executor;
mod planner;
mod supervisor;

pub use config::*;
pub use executor::{
    BenchExecutionResult, ExecutionConfig, Executor, IsolatedExecutor, ScoreStatistics,
    build_report, build_report_meta, compute_statistics, describe_limit, format_human_output,
    format_table, sample_scores, summarize_forks,
};
pub use planner::{ExecutionPlan, build_plan};
pub use supervisor::*;

use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use streambench_core::{BenchmarkDef, Registry, WorkerMain};
use streambench_ipc::{BenchmarkConfig, IterationLimit, Mode, TimeUnit};
use streambench_report::{OutputFormat, generate_json_report};
use tracing::info;

/// streambench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "streambench")]
#[command(author, version, about = "streambench - fork-isolated micro-benchmark harness")]
pub struct Cli {
    /// Optional subcommand (list, run); defaults to run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter benchmarks by regex pattern over their ids
    pub filter: Option<String>,

    /// Measurement iterations per fork
    #[arg(short = 'i', long = "iterations", global = true)]
    pub iterations: Option<u32>,

    /// Warmup iterations per fork (also `-wi`)
    #[arg(long = "warmup-iterations", global = true)]
    pub warmup_iterations: Option<u32>,

    /// Forked processes per benchmark; 0 runs in-process
    #[arg(short = 'f', long, global = true)]
    pub forks: Option<u32>,

    /// Invoking threads per fork
    #[arg(short = 't', long, global = true)]
    pub threads: Option<u32>,

    /// Benchmark mode: throughput, average or sample (also `-bm`)
    #[arg(long, global = true)]
    pub mode: Option<String>,

    /// Score time unit: s, ms, us or ns (also `-tu`)
    #[arg(long = "time-unit", global = true)]
    pub time_unit: Option<String>,

    /// Length of one measurement iteration (e.g. 1s, 200ms)
    #[arg(short = 'r', long = "iteration-time", global = true)]
    pub iteration_time: Option<String>,

    /// Length of one warmup iteration
    #[arg(short = 'w', long = "warmup-time", global = true)]
    pub warmup_time: Option<String>,

    /// Fixed invocations per iteration instead of a time budget
    #[arg(long = "ops", global = true)]
    pub ops: Option<u64>,

    /// Maximum duration of one trial (e.g. 10m); 0 disables it
    #[arg(long, global = true)]
    pub timeout: Option<String>,

    /// Benchmarks run concurrently, each in its own forks
    #[arg(long, global = true)]
    pub jobs: Option<usize>,

    /// Run benchmarks of this group only
    #[arg(long, global = true)]
    pub group: Option<String>,

    /// Output format: human or json
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Internal: Run as fork worker (used by the supervisor)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true, global = true)]
    pub bench: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the benchmarks that would run
    List {
        /// Filter benchmarks by regex pattern
        filter: Option<String>,
    },
    /// Run benchmarks (default)
    Run {
        /// Filter benchmarks by regex pattern
        filter: Option<String>,
    },
}

impl Cli {
    /// Filter given to the subcommand, else the top-level one
    pub fn filter(&self) -> &str {
        let sub = match &self.command {
            Some(Commands::List { filter }) | Some(Commands::Run { filter }) => filter.as_deref(),
            None => None,
        };
        sub.or(self.filter.as_deref()).unwrap_or(".*")
    }
}

/// Multi-letter single-dash flags and their long forms
const JMH_FLAGS: [(&str, &str); 3] = [
    ("-wi", "--warmup-iterations"),
    ("-bm", "--mode"),
    ("-tu", "--time-unit"),
];

/// Rewrite `-wi`, `-bm` and `-tu` (alone or as `-wi=5`) to their long forms.
///
/// clap would otherwise read `-wi` as `-w i`.
pub fn normalize_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            for (short, long) in JMH_FLAGS {
                if arg == short {
                    return long.to_string();
                }
                if let Some(value) = arg.strip_prefix(short).and_then(|r| r.strip_prefix('=')) {
                    return format!("{long}={value}");
                }
            }
            arg
        })
        .collect()
}

/// Run the streambench CLI over `registry`.
/// This is the main entry point for benchmark binaries.
pub fn run(registry: Registry) -> anyhow::Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args()));
    run_with_cli(cli, registry)
}

/// Run the streambench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli, registry: Registry) -> anyhow::Result<()> {
    // Worker mode first, before any other initialization
    if cli.worker {
        return run_worker_mode(registry);
    }

    let filter = if cli.verbose {
        "streambench=debug"
    } else {
        "streambench=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // Discover streambench.toml (CLI flags override)
    let config = StreamConfig::discover()?.unwrap_or_default();

    match cli.command {
        Some(Commands::List { .. }) => list_benchmarks(&cli, &registry),
        Some(Commands::Run { .. }) | None => run_benchmarks(&cli, &config, &registry),
    }
}

/// Run as a fork worker (IPC mode)
fn run_worker_mode(registry: Registry) -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_writer(std::io::stderr)
        .try_init();

    let mut worker = WorkerMain::new(registry);
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Filter benchmarks based on CLI options using the planner module.
fn filter_benchmarks<'a>(cli: &Cli, registry: &'a Registry) -> anyhow::Result<Vec<&'a BenchmarkDef>> {
    let pattern = cli.filter();
    let filter_re =
        Regex::new(pattern).with_context(|| format!("invalid filter regex '{}'", pattern))?;

    let plan = build_plan(registry.iter(), Some(&filter_re), cli.group.as_deref());
    Ok(plan.benchmarks)
}

fn list_benchmarks(cli: &Cli, registry: &Registry) -> anyhow::Result<()> {
    println!("streambench plan:");

    let benchmarks = filter_benchmarks(cli, registry)?;

    let mut groups: BTreeMap<&str, Vec<&BenchmarkDef>> = BTreeMap::new();
    for bench in &benchmarks {
        groups.entry(bench.group()).or_default().push(bench);
    }

    for (group, benches) in &groups {
        println!("├── group: {}", group);
        for bench in benches {
            println!("│   ├── {}", bench.id());
        }
    }

    println!("{} benchmarks found.", benchmarks.len());
    Ok(())
}

/// Build an ExecutionConfig by layering: built-in defaults → streambench.toml → CLI.
pub fn build_execution_config(cli: &Cli, config: &StreamConfig) -> anyhow::Result<ExecutionConfig> {
    let runner = &config.runner;

    let mode: Mode = cli
        .mode
        .as_deref()
        .unwrap_or(&runner.mode)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let time_unit: TimeUnit = cli
        .time_unit
        .as_deref()
        .unwrap_or(&runner.time_unit)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let (warmup_limit, measurement_limit) = match cli.ops.or(runner.ops_per_iteration) {
        Some(count) => (
            IterationLimit::Invocations { count },
            IterationLimit::Invocations { count },
        ),
        None => {
            let warmup = cli.warmup_time.as_deref().unwrap_or(&runner.warmup_time);
            let measurement = cli
                .iteration_time
                .as_deref()
                .unwrap_or(&runner.iteration_time);
            (
                IterationLimit::Time {
                    nanos: StreamConfig::parse_duration(warmup)
                        .with_context(|| format!("invalid warmup time '{}'", warmup))?,
                },
                IterationLimit::Time {
                    nanos: StreamConfig::parse_duration(measurement)
                        .with_context(|| format!("invalid iteration time '{}'", measurement))?,
                },
            )
        }
    };

    let timeout = cli.timeout.as_deref().unwrap_or(&runner.timeout);
    let timeout_ns = StreamConfig::parse_duration(timeout)
        .with_context(|| format!("invalid timeout '{}'", timeout))?;

    let confidence_level = runner.confidence_level;
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        anyhow::bail!(
            "confidence_level must be between 0 and 1 (exclusive), got {}",
            confidence_level
        );
    }

    let benchmark = BenchmarkConfig {
        mode,
        warmup_iterations: cli.warmup_iterations.unwrap_or(runner.warmup_iterations),
        measurement_iterations: cli.iterations.unwrap_or(runner.iterations),
        warmup_limit,
        measurement_limit,
        threads: cli.threads.unwrap_or(runner.threads),
        timeout_ns,
        max_invocation_samples: runner.max_invocation_samples,
    };
    benchmark
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    Ok(ExecutionConfig {
        benchmark,
        forks: cli.forks.unwrap_or(runner.forks),
        jobs: cli.jobs.or(runner.jobs).unwrap_or(1).max(1),
        time_unit,
        confidence_level,
    })
}

fn run_benchmarks(cli: &Cli, config: &StreamConfig, registry: &Registry) -> anyhow::Result<()> {
    let exec_config = build_execution_config(cli, config)?;
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let benchmarks = filter_benchmarks(cli, registry)?;
    if benchmarks.is_empty() {
        println!("No benchmarks found.");
        return Ok(());
    }

    let placement = if exec_config.forks == 0 {
        "in-process".to_string()
    } else {
        format!("{} fork(s) each", exec_config.forks)
    };
    eprintln!(
        "Running {} benchmarks ({}), {} thread(s), {} job(s)...\n",
        benchmarks.len(),
        placement,
        exec_config.benchmark.threads,
        exec_config.jobs
    );
    info!(
        mode = exec_config.benchmark.mode.label(),
        warmup_iterations = exec_config.benchmark.warmup_iterations,
        measurement_iterations = exec_config.benchmark.measurement_iterations,
        "starting run"
    );

    let start_time = Instant::now();

    let results = if exec_config.forks == 0 {
        if exec_config.jobs > 1 {
            eprintln!("Warning: --jobs applies only to forked runs; running in-process serially.");
        }
        Executor::new(exec_config.clone()).execute(&benchmarks)
    } else {
        IsolatedExecutor::new(exec_config.clone()).execute(&benchmarks)
    };

    let stats = compute_statistics(&results, &exec_config);

    let total_duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    let report = build_report(&results, &stats, &exec_config, total_duration_ms);

    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        eprintln!("Report written to: {}", path.display());
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
    }

    if report.has_failures() {
        if report.summary.config_errors > 0 {
            eprintln!(
                "\n{} benchmark(s) failed setup",
                report.summary.config_errors
            );
        }
        if report.summary.crashed > 0 {
            eprintln!("\n{} benchmark(s) produced no samples", report.summary.crashed);
        }
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["streambench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(normalize_args(argv)).unwrap()
    }

    #[test]
    fn test_normalize_jmh_flags() {
        let args = normalize_args(["streambench", "-wi", "3", "-bm=sample", "-tu", "ms", "-w", "1s"]);
        assert_eq!(
            args,
            vec![
                "streambench",
                "--warmup-iterations",
                "3",
                "--mode=sample",
                "--time-unit",
                "ms",
                "-w",
                "1s"
            ]
        );
    }

    #[test]
    fn test_jmh_style_command_line() {
        let cli = parse(&["-wi", "5", "-i", "10", "-f", "2", "-t", "4", "-bm", "average", "-tu", "us"]);
        let config = build_execution_config(&cli, &StreamConfig::default()).unwrap();
        assert_eq!(config.benchmark.warmup_iterations, 5);
        assert_eq!(config.benchmark.measurement_iterations, 10);
        assert_eq!(config.benchmark.threads, 4);
        assert_eq!(config.benchmark.mode, Mode::AverageTime);
        assert_eq!(config.forks, 2);
        assert_eq!(config.time_unit, TimeUnit::Microseconds);
    }

    #[test]
    fn test_defaults() {
        let config = build_execution_config(&parse(&[]), &StreamConfig::default()).unwrap();
        assert_eq!(config.benchmark, BenchmarkConfig::default());
        assert_eq!(config.forks, 1);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.time_unit, TimeUnit::Seconds);
        assert_eq!(config.confidence_level, 0.999);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = StreamConfig::default();
        file.runner.iterations = 20;
        file.runner.forks = 3;
        file.runner.iteration_time = "200ms".to_string();

        let config = build_execution_config(&parse(&["-f", "0"]), &file).unwrap();
        assert_eq!(config.benchmark.measurement_iterations, 20);
        assert_eq!(config.forks, 0);
        assert_eq!(
            config.benchmark.measurement_limit,
            IterationLimit::Time { nanos: 200_000_000 }
        );
    }

    #[test]
    fn test_ops_switches_to_invocation_limits() {
        let config = build_execution_config(&parse(&["--ops", "100"]), &StreamConfig::default()).unwrap();
        assert_eq!(
            config.benchmark.warmup_limit,
            IterationLimit::Invocations { count: 100 }
        );
        assert_eq!(
            config.benchmark.measurement_limit,
            IterationLimit::Invocations { count: 100 }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = StreamConfig::default();
        assert!(build_execution_config(&parse(&["-bm", "fastest"]), &file).is_err());
        assert!(build_execution_config(&parse(&["-i", "0"]), &file).is_err());
        assert!(build_execution_config(&parse(&["-t", "0"]), &file).is_err());
        assert!(build_execution_config(&parse(&["--timeout", "soon"]), &file).is_err());

        let mut bad_level = StreamConfig::default();
        bad_level.runner.confidence_level = 1.5;
        assert!(build_execution_config(&parse(&[]), &bad_level).is_err());
    }

    #[test]
    fn test_subcommand_filter() {
        let cli = parse(&["run", "_parallel$", "-i", "3"]);
        assert!(matches!(cli.command, Some(Commands::Run { .. })));
        assert_eq!(cli.filter(), "_parallel$");
        assert_eq!(cli.iterations, Some(3));

        assert_eq!(parse(&["list"]).filter(), ".*");
        assert_eq!(parse(&["sequential"]).filter(), "sequential");
    }

    #[test]
    fn test_worker_flag() {
        let cli = parse(&["--worker"]);
        assert!(cli.worker);
    }
}
