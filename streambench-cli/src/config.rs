//! Configuration loading from streambench.toml
//!
//! streambench configuration can be specified in a `streambench.toml` file in
//! the project root. The configuration is automatically discovered by walking
//! up from the current directory. Command-line flags override it.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name searched for by [`StreamConfig::discover`]
pub const CONFIG_FILE_NAME: &str = "streambench.toml";

/// streambench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Runner configuration for benchmark execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Warmup iterations per fork
    #[serde(default = "default_warmup_iterations")]
    pub warmup_iterations: u32,
    /// Measurement iterations per fork
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Forked processes per benchmark (0 = run in-process)
    #[serde(default = "default_forks")]
    pub forks: u32,
    /// Invoking threads per fork
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Benchmark mode: "throughput", "average" or "sample"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Score time unit: "s", "ms", "us" or "ns"
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    /// Length of one warmup iteration (e.g., "1s")
    #[serde(default = "default_iteration_time")]
    pub warmup_time: String,
    /// Length of one measurement iteration (e.g., "1s")
    #[serde(default = "default_iteration_time")]
    pub iteration_time: String,
    /// Fixed invocations per iteration instead of a time budget
    #[serde(default)]
    pub ops_per_iteration: Option<u64>,
    /// Maximum duration of one trial (e.g., "10m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Confidence level (e.g., 0.999 for 99.9%)
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    /// Benchmarks run concurrently in separate forks
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Per-iteration cap on recorded invocations in sample mode
    #[serde(default = "default_max_invocation_samples")]
    pub max_invocation_samples: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: default_warmup_iterations(),
            iterations: default_iterations(),
            forks: default_forks(),
            threads: default_threads(),
            mode: default_mode(),
            time_unit: default_time_unit(),
            warmup_time: default_iteration_time(),
            iteration_time: default_iteration_time(),
            ops_per_iteration: None,
            timeout: default_timeout(),
            confidence_level: default_confidence_level(),
            jobs: None,
            max_invocation_samples: default_max_invocation_samples(),
        }
    }
}

fn default_warmup_iterations() -> u32 {
    5
}
fn default_iterations() -> u32 {
    5
}
fn default_forks() -> u32 {
    1
}
fn default_threads() -> u32 {
    1
}
fn default_mode() -> String {
    "throughput".to_string()
}
fn default_time_unit() -> String {
    "s".to_string()
}
fn default_iteration_time() -> String {
    "1s".to_string()
}
fn default_timeout() -> String {
    "10m".to_string()
}
fn default_confidence_level() -> f64 {
    0.999
}
fn default_max_invocation_samples() -> u64 {
    100_000
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl StreamConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory.
    ///
    /// A file that exists but fails to parse is an error, not a silent default.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let Ok(mut dir) = std::env::current_dir() else {
            return Ok(None);
        };
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path).map(Some).map_err(|e| {
                    anyhow::anyhow!("failed to load {}: {}", config_path.display(), e)
                });
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# streambench configuration

[runner]
# Warmup iterations per fork (results discarded)
warmup_iterations = 5
# Measurement iterations per fork
iterations = 5
# Forked processes per benchmark (0 runs in-process)
forks = 1
# Invoking threads per fork
threads = 1
# Benchmark mode: throughput, average or sample
mode = "throughput"
# Score time unit: s, ms, us or ns
time_unit = "s"
# Length of one warmup / measurement iteration
warmup_time = "1s"
iteration_time = "1s"
# Fixed invocations per iteration instead of a time budget (uncomment to enable)
# ops_per_iteration = 100
# Maximum duration of one trial
timeout = "10m"
# Confidence level (0.0 to 1.0)
confidence_level = 0.999
# Benchmarks run concurrently (uncomment to enable)
# jobs = 2
# Per-iteration cap on recorded invocations in sample mode
max_invocation_samples = 100000

[output]
# Default output format: human or json
format = "human"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}
