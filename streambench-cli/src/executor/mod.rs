//! Benchmark Executor
//!
//! Runs benchmarks and turns their samples into a report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ExecutionPlan (registered benchmarks, filtered)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Fork per trial, collect samples, fold fork outcomes
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ statistics  │  Scores per mode/unit, summary + CI (parallel)
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │   report    │  Build Report with metadata
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Results table and details
//! └─────────────┘
//! ```

mod execution;
mod formatting;
mod metadata;
mod report;
mod statistics;

pub use execution::{
    BenchExecutionResult, ExecutionConfig, Executor, IsolatedExecutor, summarize_forks,
};
pub use formatting::{format_human_output, format_table};
pub use metadata::{build_report_meta, describe_limit};
pub use report::build_report;
pub use statistics::{ScoreStatistics, compute_statistics, sample_scores};
