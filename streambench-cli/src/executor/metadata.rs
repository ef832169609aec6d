//! System Metadata Collection
//!
//! Collects the host and run configuration recorded in report metadata.
//! Linux-specific data (CPU model, kernel release) degrades to "Unknown"
//! on other platforms.

use super::execution::ExecutionConfig;
use chrono::Utc;
use streambench_ipc::IterationLimit;
use streambench_report::{ReportConfig, ReportMeta, ReportSchema, SystemInfo};

/// Build report metadata including system info and run configuration
pub fn build_report_meta(config: &ExecutionConfig) -> ReportMeta {
    let system = SystemInfo {
        os: std::env::consts::OS.to_string(),
        os_version: get_os_release().unwrap_or_else(|| std::env::consts::ARCH.to_string()),
        cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: num_cpus(),
    };

    let bench = &config.benchmark;
    ReportMeta {
        schema_version: ReportSchema::default().version,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system,
        config: ReportConfig {
            mode: bench.mode.label().to_string(),
            time_unit: config.time_unit.label().to_string(),
            warmup_iterations: bench.warmup_iterations,
            measurement_iterations: bench.measurement_iterations,
            forks: config.forks,
            threads: bench.threads,
            warmup_limit: describe_limit(&bench.warmup_limit),
            measurement_limit: describe_limit(&bench.measurement_limit),
            timeout_ns: bench.timeout_ns,
            confidence_level: config.confidence_level,
        },
    }
}

/// Render an iteration limit the way it was configured (`1s`, `250ms`, `100 ops`)
pub fn describe_limit(limit: &IterationLimit) -> String {
    match *limit {
        IterationLimit::Invocations { count } => format!("{} ops", count),
        IterationLimit::Time { nanos } => format_nanos(nanos),
    }
}

fn format_nanos(nanos: u64) -> String {
    const UNITS: [(u64, &str); 4] = [
        (1_000_000_000, "s"),
        (1_000_000, "ms"),
        (1_000, "us"),
        (1, "ns"),
    ];
    UNITS
        .iter()
        .find(|(scale, _)| nanos >= *scale && nanos % scale == 0)
        .map(|(scale, unit)| format!("{}{}", nanos / scale, unit))
        .unwrap_or_else(|| format!("{}ns", nanos))
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("model name"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Get kernel release (Linux only)
fn get_os_release() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|s| s.trim().to_string())
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_limit() {
        assert_eq!(describe_limit(&IterationLimit::Time { nanos: 1_000_000_000 }), "1s");
        assert_eq!(describe_limit(&IterationLimit::Time { nanos: 250_000_000 }), "250ms");
        assert_eq!(describe_limit(&IterationLimit::Time { nanos: 1_500 }), "1500ns");
        assert_eq!(describe_limit(&IterationLimit::Invocations { count: 100 }), "100 ops");
    }

    #[test]
    fn test_meta_captures_config() {
        let meta = build_report_meta(&ExecutionConfig::default());
        assert_eq!(meta.config.mode, "thrpt");
        assert_eq!(meta.config.time_unit, "s");
        assert_eq!(meta.config.forks, 1);
        assert!(meta.system.cpu_cores >= 1);
    }
}
