#![warn(missing_docs)]
//! streambench Core - Trial Runtime
//!
//! This crate provides the execution environment for benchmarks:
//! - `Registry` of benchmark definitions built with explicit registration
//! - Trial lifecycle (state construction, setup, teardown) with panic isolation
//! - `Bencher` driving warmup and measurement iterations
//! - `Blackhole` sink and `WorkerPool` for multi-threaded invocation
//! - Fork worker entry point speaking the IPC protocol

mod bencher;
mod blackhole;
mod lifecycle;
mod measure;
mod pool;
mod registry;
mod worker;

pub use bencher::{Bencher, Phase, SampleSink, TrialOutcome, WarmupSummary};
pub use blackhole::Blackhole;
pub use lifecycle::{TrialError, run_trial};
pub use measure::{Instant, Timer};
pub use pool::{PoolError, WorkerPool, partition_bounds};
pub use registry::{BenchmarkDef, Hooks, Registry, RegistryError, SetupError, Trial, TrialFactory};
pub use worker::{IPC_FD_ENV, WorkerMain, shutdown_requested};

/// Group assigned to benchmarks registered without one
pub const DEFAULT_GROUP: &str = "default";
