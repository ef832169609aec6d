//! Benchmark Planner
//!
//! Builds execution plan by filtering and ordering benchmarks.
//!
//! Filtering options:
//! - Regex pattern matching on benchmark ID
//! - Group filtering
//!
//! Ordering: Benchmarks are sorted alphabetically by ID for deterministic execution.

use streambench_core::BenchmarkDef;

/// Execution plan for benchmarks
pub struct ExecutionPlan<'a> {
    /// Ordered list of benchmarks to run
    pub benchmarks: Vec<&'a BenchmarkDef>,
}

/// Build execution plan from registered benchmarks
///
/// Filters benchmarks based on CLI options and returns them in deterministic order.
pub fn build_plan<'a>(
    benchmarks: impl IntoIterator<Item = &'a BenchmarkDef>,
    filter: Option<&regex::Regex>,
    group: Option<&str>,
) -> ExecutionPlan<'a> {
    let mut selected: Vec<_> = benchmarks
        .into_iter()
        .filter(|b| filter.is_none_or(|re| re.is_match(b.id())))
        .filter(|b| group.is_none_or(|g| b.group() == g))
        .collect();

    // Sort alphabetically for deterministic execution order
    selected.sort_by(|a, b| a.id().cmp(b.id()));

    ExecutionPlan {
        benchmarks: selected,
    }
}
