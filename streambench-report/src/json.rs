//! JSON Output

use crate::report::Report;
use serde::{Deserialize, Serialize};

/// Schema information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSchema {
    /// Schema identifier
    pub schema: String,
    /// Schema version
    pub version: u32,
}

impl Default for ReportSchema {
    fn default() -> Self {
        Self {
            schema: "streambench-report".to_string(),
            version: 1,
        }
    }
}

/// Generate a prettified JSON report.
pub fn generate_json_report(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Read a report previously written with `generate_json_report`
pub fn parse_json_report(json: &str) -> Result<Report, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::*;
    use chrono::Utc;

    fn sample_report() -> Report {
        Report {
            meta: ReportMeta {
                schema_version: ReportSchema::default().version,
                version: "0.1.0".to_string(),
                timestamp: Utc::now(),
                system: SystemInfo {
                    os: "linux".to_string(),
                    os_version: "6.1".to_string(),
                    cpu: "test cpu".to_string(),
                    cpu_cores: 8,
                },
                config: ReportConfig {
                    mode: "thrpt".to_string(),
                    time_unit: "s".to_string(),
                    warmup_iterations: 5,
                    measurement_iterations: 5,
                    forks: 1,
                    threads: 1,
                    warmup_limit: "1s".to_string(),
                    measurement_limit: "1s".to_string(),
                    timeout_ns: 600_000_000_000,
                    confidence_level: 0.999,
                },
            },
            results: vec![BenchmarkReportResult {
                id: "filter_map_sequential".to_string(),
                group: "filter_map".to_string(),
                mode: "thrpt".to_string(),
                unit: "ops/s".to_string(),
                status: BenchmarkStatus::ConfigError,
                forks: ForkSummary {
                    requested: 1,
                    completed: 0,
                    timed_out: 0,
                },
                truncated: false,
                metrics: None,
                failure: Some(FailureInfo {
                    kind: "setup".to_string(),
                    message: "setup failed: no input".to_string(),
                }),
                notes: Vec::new(),
            }],
            summary: ReportSummary {
                total_benchmarks: 1,
                config_errors: 1,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_json_contains_results() {
        let json = generate_json_report(&sample_report()).unwrap();
        assert!(json.contains("\"filter_map_sequential\""));
        assert!(json.contains("\"config-error\""));
        assert!(!json.contains("\"notes\""));
    }

    #[test]
    fn test_json_parses_back() {
        let json = generate_json_report(&sample_report()).unwrap();
        let report = parse_json_report(&json).unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(report.has_failures());
        assert_eq!(report.results[0].status, BenchmarkStatus::ConfigError);
    }
}
