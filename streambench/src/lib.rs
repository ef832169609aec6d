#![warn(missing_docs)]
//! # streambench
//!
//! Measures the throughput of sequential versus parallel stream processing,
//! with a small harness that runs every fork of a benchmark in a fresh
//! process:
//! - **Fork isolation**: each fork re-executes the binary as a worker; a
//!   panicking or hanging benchmark costs one fork, not the run
//! - **Warmup and measurement** iterations bounded by time or invocation count
//! - **Multi-threaded invocation** on a fixed-size worker pool
//! - **Student-t confidence intervals** over per-iteration scores
//!
//! ## Quick Start
//!
//! ```ignore
//! use streambench::{BenchmarkDef, Hooks, Registry};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = Registry::new();
//!     registry.register(
//!         BenchmarkDef::new("sum", Hooks::new(|| Ok((1..=1000).collect::<Vec<u64>>()), |v| v.iter().sum::<u64>()))
//!             .in_group("arith"),
//!     )?;
//!     streambench::run(registry)
//! }
//! ```

pub mod workload;

pub use workload::{
    GROUP, INPUT_LEN, POOL_THREADS_ENV, StreamState, filter_map_parallel, filter_map_sequential,
    filter_then_map_parallel, filter_then_map_sequential, register_stream_benchmarks, stream_pool,
};

// Re-export core types
pub use streambench_core::{
    Bencher, BenchmarkDef, Blackhole, Hooks, Registry, RegistryError, SetupError, TrialError,
    WorkerPool, run_trial,
};

// Re-export wire-level configuration
pub use streambench_ipc::{BenchmarkConfig, IterationLimit, Mode, Sample, TimeUnit};

// Re-export stats
pub use streambench_stats::{SummaryStatistics, compute_summary};

/// Run the streambench CLI harness over a registry.
///
/// Call this from your benchmark binary's `main()`:
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     let mut registry = streambench::Registry::new();
///     streambench::register_stream_benchmarks(&mut registry)?;
///     streambench::run(registry)
/// }
/// ```
pub use streambench_cli::run;
