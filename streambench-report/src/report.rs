//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use streambench_stats::{Percentiles, SummaryStatistics};

/// Complete benchmark report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Run metadata
    pub meta: ReportMeta,
    /// One entry per benchmark, in run order
    pub results: Vec<BenchmarkReportResult>,
    /// Status counts and run duration
    pub summary: ReportSummary,
}

impl Report {
    /// Whether any benchmark failed setup or produced nothing
    pub fn has_failures(&self) -> bool {
        self.summary.config_errors > 0 || self.summary.crashed > 0
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Report schema version
    pub schema_version: u32,
    /// Harness version
    pub version: String,
    /// When the report was built
    pub timestamp: DateTime<Utc>,
    /// Machine the run happened on
    pub system: SystemInfo,
    /// Run configuration
    pub config: ReportConfig,
}

/// Execution configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Mode label
    pub mode: String,
    /// Score time unit
    pub time_unit: String,
    /// Warmup iterations per fork
    pub warmup_iterations: u32,
    /// Measurement iterations per fork
    pub measurement_iterations: u32,
    /// Forks per benchmark (0 = in-process)
    pub forks: u32,
    /// Invoking threads per fork
    pub threads: u32,
    /// Warmup iteration limit, e.g. `1s` or `10 ops`
    pub warmup_limit: String,
    /// Measurement iteration limit
    pub measurement_limit: String,
    /// Trial timeout (0 = none)
    pub timeout_ns: u64,
    /// Confidence level of the intervals
    pub confidence_level: f64,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// Kernel or OS release
    pub os_version: String,
    /// CPU model
    pub cpu: String,
    /// Logical CPUs
    pub cpu_cores: u32,
}

/// Individual benchmark result in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReportResult {
    /// Benchmark id
    pub id: String,
    /// Benchmark group
    pub group: String,
    /// Mode label (`thrpt`, `avgt`, `sample`)
    pub mode: String,
    /// Score unit (`ops/s`, `ms/op`, ...)
    pub unit: String,
    /// Outcome after folding all forks
    pub status: BenchmarkStatus,
    /// Fork accounting
    pub forks: ForkSummary,
    /// Whether any fork stopped measuring early
    pub truncated: bool,
    /// Scores, absent when nothing was measured
    pub metrics: Option<BenchmarkMetrics>,
    /// Why the benchmark failed, if it did
    pub failure: Option<FailureInfo>,
    /// Per-fork remarks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// Benchmark execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkStatus {
    /// Every requested fork completed
    Passed,
    /// Some forks crashed or timed out, but samples exist
    Partial,
    /// Setup failed; nothing was measured
    ConfigError,
    /// No fork produced samples
    Crashed,
}

impl BenchmarkStatus {
    /// Label used in tables and logs
    pub fn label(self) -> &'static str {
        match self {
            BenchmarkStatus::Passed => "passed",
            BenchmarkStatus::Partial => "partial",
            BenchmarkStatus::ConfigError => "config-error",
            BenchmarkStatus::Crashed => "crashed",
        }
    }
}

/// Fork accounting for one benchmark
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSummary {
    /// Forks asked for
    pub requested: u32,
    /// Forks that ran to the end
    pub completed: u32,
    /// Forks killed at the hard deadline
    pub timed_out: u32,
}

/// Aggregated scores for one benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    /// Scores aggregated
    pub samples: usize,
    /// Mean score
    pub score: f64,
    /// Confidence interval half-width
    #[serde(with = "nullable_f64")]
    pub error: f64,
    /// Smallest score
    pub min: f64,
    /// Largest score
    pub max: f64,
    /// Sample standard deviation
    #[serde(with = "nullable_f64")]
    pub std_dev: f64,
    /// Lower confidence bound
    #[serde(with = "nullable_f64")]
    pub ci_lower: f64,
    /// Upper confidence bound
    #[serde(with = "nullable_f64")]
    pub ci_upper: f64,
    /// Confidence level of the bounds
    pub ci_level: f64,
    /// Score percentiles in sample-time mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<PercentileMetrics>,
}

impl From<&SummaryStatistics> for BenchmarkMetrics {
    fn from(stats: &SummaryStatistics) -> Self {
        Self {
            samples: stats.sample_count,
            score: stats.mean,
            error: stats.error(),
            min: stats.min,
            max: stats.max,
            std_dev: stats.std_dev,
            ci_lower: stats.confidence_interval.lower,
            ci_upper: stats.confidence_interval.upper,
            ci_level: stats.confidence_interval.level,
            percentiles: None,
        }
    }
}

/// Score percentiles (sample-time mode)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileMetrics {
    /// Minimum
    pub p0: f64,
    /// Median
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// 99.9th percentile
    pub p999: f64,
    /// Maximum
    pub p100: f64,
}

impl From<&Percentiles> for PercentileMetrics {
    fn from(p: &Percentiles) -> Self {
        Self {
            p0: p.p0,
            p50: p.p50,
            p90: p.p90,
            p95: p.p95,
            p99: p.p99,
            p999: p.p999,
            p100: p.p100,
        }
    }
}

impl PercentileMetrics {
    /// Label/value pairs in ascending order, for display
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("p0.00", self.p0),
            ("p0.50", self.p50),
            ("p0.90", self.p90),
            ("p0.95", self.p95),
            ("p0.99", self.p99),
            ("p0.999", self.p999),
            ("p1.00", self.p100),
        ]
    }
}

/// Failure information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureInfo {
    /// `setup` or `crash`
    pub kind: String,
    /// Message of the deciding failure
    pub message: String,
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Benchmarks in the run
    pub total_benchmarks: usize,
    /// Benchmarks with every fork completed
    pub passed: usize,
    /// Benchmarks with some forks lost
    pub partial: usize,
    /// Benchmarks that failed setup
    pub config_errors: usize,
    /// Benchmarks with no samples
    pub crashed: usize,
    /// Wall time of the whole run
    pub total_duration_ms: f64,
}

/// JSON has no NaN; undefined statistics travel as `null`
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
