#![warn(missing_docs)]
//! streambench Report - Result Data Model
//!
//! The serializable shape of a run's results, shared by the terminal
//! formatter and the JSON writer.

mod json;
mod report;

pub use json::{ReportSchema, generate_json_report, parse_json_report};
pub use report::{
    BenchmarkMetrics, BenchmarkReportResult, BenchmarkStatus, FailureInfo, ForkSummary,
    PercentileMetrics, Report, ReportConfig, ReportMeta, ReportSummary, SystemInfo,
};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable results table
    #[default]
    Human,
    /// JSON with full schema
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" | "table" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
