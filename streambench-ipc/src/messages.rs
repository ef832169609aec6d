//! IPC Message Types
//!
//! Everything that crosses the supervisor/worker boundary derives rkyv's
//! `Archive` with byte checking so frames are validated before use.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use std::fmt;
use std::str::FromStr;

/// One measured duration together with the number of operations it covers.
///
/// In throughput and average-time modes a sample is one whole iteration; in
/// sample-time mode it is a single invocation (`operations == 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[repr(C, align(8))]
pub struct Sample {
    /// Wall-clock duration in nanoseconds
    pub duration_nanos: u64,
    /// Benchmark invocations covered by `duration_nanos`
    pub operations: u64,
}

impl Sample {
    /// Create a new sample
    #[inline]
    pub fn new(duration_nanos: u64, operations: u64) -> Self {
        Self {
            duration_nanos,
            operations,
        }
    }

    /// Convert this sample into a score for the given mode.
    ///
    /// Throughput is operations per `unit`; average and sample modes are
    /// `unit` per operation. Degenerate samples score NaN.
    pub fn score(&self, mode: Mode, unit: TimeUnit) -> f64 {
        if self.operations == 0 {
            return f64::NAN;
        }
        let elapsed = self.duration_nanos as f64 / unit.nanos() as f64;
        match mode {
            Mode::Throughput => {
                if self.duration_nanos == 0 {
                    f64::NAN
                } else {
                    self.operations as f64 / elapsed
                }
            }
            Mode::AverageTime | Mode::SampleTime => elapsed / self.operations as f64,
        }
    }
}

/// Benchmark mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum Mode {
    /// Operations per time unit, one sample per iteration
    Throughput,
    /// Time per operation, one sample per iteration
    AverageTime,
    /// Time per operation, one sample per invocation
    SampleTime,
}

impl Mode {
    /// Short label used in result tables
    pub fn label(self) -> &'static str {
        match self {
            Mode::Throughput => "thrpt",
            Mode::AverageTime => "avgt",
            Mode::SampleTime => "sample",
        }
    }

    /// Unit string for scores in this mode
    pub fn unit_label(self, unit: TimeUnit) -> String {
        match self {
            Mode::Throughput => format!("ops/{}", unit.label()),
            Mode::AverageTime | Mode::SampleTime => format!("{}/op", unit.label()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "throughput" | "thrpt" => Ok(Mode::Throughput),
            "average" | "averagetime" | "avgt" => Ok(Mode::AverageTime),
            "sample" | "sampletime" => Ok(Mode::SampleTime),
            other => Err(format!(
                "unknown benchmark mode '{other}' (expected throughput, average or sample)"
            )),
        }
    }
}

/// Time unit for reported scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum TimeUnit {
    /// Seconds
    Seconds,
    /// Milliseconds
    Milliseconds,
    /// Microseconds
    Microseconds,
    /// Nanoseconds
    Nanoseconds,
}

impl TimeUnit {
    /// Nanoseconds in one unit
    pub fn nanos(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1_000_000_000,
            TimeUnit::Milliseconds => 1_000_000,
            TimeUnit::Microseconds => 1_000,
            TimeUnit::Nanoseconds => 1,
        }
    }

    /// Short unit label
    pub fn label(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(TimeUnit::Seconds),
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "us" | "µs" | "micros" | "microseconds" => Ok(TimeUnit::Microseconds),
            "ns" | "nanos" | "nanoseconds" => Ok(TimeUnit::Nanoseconds),
            other => Err(format!("unknown time unit '{other}' (expected s, ms, us or ns)")),
        }
    }
}

/// What bounds a single warmup or measurement iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum IterationLimit {
    /// Keep invoking until this much wall-clock time has passed
    Time {
        /// Iteration length in nanoseconds
        nanos: u64,
    },
    /// Invoke exactly this many times (per thread)
    Invocations {
        /// Invocation count
        count: u64,
    },
}

impl IterationLimit {
    fn is_empty(&self) -> bool {
        match *self {
            IterationLimit::Time { nanos } => nanos == 0,
            IterationLimit::Invocations { count } => count == 0,
        }
    }
}

/// Configuration for one trial
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct BenchmarkConfig {
    /// Benchmark mode
    pub mode: Mode,
    /// Warmup iterations (results discarded)
    pub warmup_iterations: u32,
    /// Measurement iterations
    pub measurement_iterations: u32,
    /// Bound for each warmup iteration
    pub warmup_limit: IterationLimit,
    /// Bound for each measurement iteration
    pub measurement_limit: IterationLimit,
    /// Concurrent invoking threads
    pub threads: u32,
    /// Maximum trial duration in nanoseconds (0 = unbounded)
    pub timeout_ns: u64,
    /// Per-iteration cap on recorded invocations in sample-time mode
    pub max_invocation_samples: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Throughput,
            warmup_iterations: 5,
            measurement_iterations: 5,
            warmup_limit: IterationLimit::Time {
                nanos: 1_000_000_000,
            },
            measurement_limit: IterationLimit::Time {
                nanos: 1_000_000_000,
            },
            threads: 1,
            timeout_ns: 600_000_000_000, // 10 minutes
            max_invocation_samples: 100_000,
        }
    }
}

impl BenchmarkConfig {
    /// Validate configuration values, returning a description of the first error found.
    pub fn validate(&self) -> Result<(), String> {
        if self.measurement_iterations == 0 {
            return Err("measurement iterations must be > 0".to_string());
        }
        if self.threads == 0 {
            return Err("threads must be > 0".to_string());
        }
        if self.measurement_limit.is_empty() {
            return Err("measurement iteration limit must be > 0".to_string());
        }
        if self.warmup_iterations > 0 && self.warmup_limit.is_empty() {
            return Err("warmup iteration limit must be > 0".to_string());
        }
        if let IterationLimit::Time { nanos } = self.measurement_limit {
            if self.timeout_ns > 0 && self.timeout_ns < nanos {
                return Err(format!(
                    "timeout ({} ns) must be >= iteration time ({} ns)",
                    self.timeout_ns, nanos
                ));
            }
        }
        if self.mode == Mode::SampleTime && self.max_invocation_samples == 0 {
            return Err("max_invocation_samples must be > 0 in sample mode".to_string());
        }
        Ok(())
    }
}

/// Why a sample batch was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FlushReason {
    /// Batch size limit reached
    BatchFull,
    /// Trial finished (normally or not)
    TrialEnd,
}

/// A batch of samples sent from worker to supervisor
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct SampleBatch {
    /// Fork index (1-based) the samples belong to
    pub fork: u32,
    /// Position of this batch within the fork, from 0; a gap means a lost batch
    pub sequence: u32,
    /// The samples, in recording order
    pub samples: Vec<Sample>,
    /// Why this batch was flushed
    pub flush_reason: FlushReason,
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Number of logical CPUs available
    pub cpu_count: u32,
    /// Worker process id
    pub pid: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            cpu_count: std::thread::available_parallelism()
                .map(|p| p.get() as u32)
                .unwrap_or(1),
            pid: std::process::id(),
        }
    }
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),

    /// Warmup phase summary (informational only)
    WarmupComplete {
        /// Warmup iterations performed
        iterations: u32,
        /// Invocations performed during warmup
        invocations: u64,
        /// Total warmup time in nanoseconds
        duration_nanos: u64,
    },

    /// A batch of measurement samples
    SampleBatch(SampleBatch),

    /// Trial finished and teardown ran
    Complete {
        /// Invocations performed during measurement
        total_invocations: u64,
        /// Measurement iterations actually executed
        measured_iterations: u32,
        /// Whether the timeout or a shutdown request cut the trial short
        truncated: bool,
    },

    /// Trial aborted
    Failure {
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Categories of trial failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// Setup returned an error or panicked (configuration error)
    Setup,
    /// The workload panicked during warmup or measurement
    Panic,
    /// The requested benchmark is not registered in the worker
    NotFound,
    /// The worker could not prepare the trial (e.g. thread pool creation)
    Internal,
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Run one trial of a benchmark
    Run {
        /// Benchmark identifier
        bench_id: String,
        /// Fork index (1-based)
        fork: u32,
        /// Configuration for this trial
        config: BenchmarkConfig,
    },

    /// Request graceful shutdown
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput_score() {
        // 1000 ops in 2 ms = 500 ops/ms
        let sample = Sample::new(2_000_000, 1000);
        let score = sample.score(Mode::Throughput, TimeUnit::Milliseconds);
        assert!((score - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_score() {
        // 4 us spread over 2 ops = 2 us/op
        let sample = Sample::new(4_000, 2);
        let score = sample.score(Mode::AverageTime, TimeUnit::Microseconds);
        assert!((score - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_scores_are_nan() {
        assert!(Sample::new(100, 0).score(Mode::AverageTime, TimeUnit::Nanoseconds).is_nan());
        assert!(Sample::new(0, 5).score(Mode::Throughput, TimeUnit::Seconds).is_nan());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("throughput".parse::<Mode>().unwrap(), Mode::Throughput);
        assert_eq!("avgt".parse::<Mode>().unwrap(), Mode::AverageTime);
        assert_eq!("Sample".parse::<Mode>().unwrap(), Mode::SampleTime);
        assert!("fastest".parse::<Mode>().is_err());
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(Mode::Throughput.unit_label(TimeUnit::Seconds), "ops/s");
        assert_eq!(Mode::AverageTime.unit_label(TimeUnit::Milliseconds), "ms/op");
        assert_eq!("us".parse::<TimeUnit>().unwrap().nanos(), 1_000);
    }

    #[test]
    fn test_benchmark_config_validate_default() {
        assert!(BenchmarkConfig::default().validate().is_ok());
    }

    #[test]
    fn test_benchmark_config_validate_zero_iterations() {
        let config = BenchmarkConfig {
            measurement_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_benchmark_config_validate_timeout_lt_iteration() {
        let config = BenchmarkConfig {
            timeout_ns: 1_000_000,
            measurement_limit: IterationLimit::Time {
                nanos: 5_000_000_000,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_benchmark_config_allows_empty_warmup_limit_without_warmup() {
        let config = BenchmarkConfig {
            warmup_iterations: 0,
            warmup_limit: IterationLimit::Invocations { count: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_capabilities_default() {
        let caps = WorkerCapabilities::default();
        assert_eq!(caps.protocol_version, crate::PROTOCOL_VERSION);
        assert!(caps.cpu_count >= 1);
    }
}
