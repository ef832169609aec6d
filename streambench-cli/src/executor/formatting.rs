//! Output Formatting
//!
//! Human-readable output: a results table followed by a detail block per
//! benchmark and a run summary.
//!
//! ```text
//! Benchmark               Mode  Cnt   Score   Error  Units
//! filter_map_parallel    thrpt    5  81.223 ± 2.117  ops/s
//! filter_map_sequential  thrpt    5  35.870 ± 0.412  ops/s
//! ```
//!
//! Column widths come from the content; numbers are right-aligned with three
//! decimals. Rows without scores carry their failure message instead.

use std::fmt::Write as _;
use streambench_report::{BenchmarkReportResult, Report};

const HEADERS: [&str; 6] = ["Benchmark", "Mode", "Cnt", "Score", "Error", "Units"];

fn number(value: f64) -> String {
    format!("{:.3}", value)
}

fn percent(level: f64) -> String {
    let pct = (level * 100_000.0).round() / 1000.0;
    if pct.fract() == 0.0 {
        format!("{:.0}%", pct)
    } else {
        format!("{}%", pct)
    }
}

/// Cells of a scored row: (benchmark, mode, count, score, error, unit)
fn row_cells(result: &BenchmarkReportResult) -> Option<[String; 6]> {
    let metrics = result.metrics.as_ref()?;
    Some([
        result.id.clone(),
        result.mode.clone(),
        metrics.samples.to_string(),
        number(metrics.score),
        number(metrics.error),
        result.unit.clone(),
    ])
}

/// Format the results table
pub fn format_table(report: &Report) -> String {
    let rows: Vec<(&BenchmarkReportResult, Option<[String; 6]>)> =
        report.results.iter().map(|r| (r, row_cells(r))).collect();

    let mut widths = HEADERS.map(str::len);
    for (result, cells) in &rows {
        widths[0] = widths[0].max(result.id.len());
        if let Some(cells) = cells {
            for (width, cell) in widths.iter_mut().zip(cells).skip(1) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();
    let _ = writeln!(
        output,
        "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$}   {:>w4$}  {}",
        HEADERS[0],
        HEADERS[1],
        HEADERS[2],
        HEADERS[3],
        HEADERS[4],
        HEADERS[5],
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
        w3 = widths[3],
        w4 = widths[4],
    );

    for (result, cells) in rows {
        match cells {
            Some(cells) => {
                let _ = writeln!(
                    output,
                    "{:<w0$}  {:>w1$}  {:>w2$}  {:>w3$} ± {:>w4$}  {}",
                    cells[0],
                    cells[1],
                    cells[2],
                    cells[3],
                    cells[4],
                    cells[5],
                    w0 = widths[0],
                    w1 = widths[1],
                    w2 = widths[2],
                    w3 = widths[3],
                    w4 = widths[4],
                );
            }
            None => {
                let message = result
                    .failure
                    .as_ref()
                    .map(|f| f.message.as_str())
                    .unwrap_or("no samples");
                let _ = writeln!(
                    output,
                    "{:<w0$}  {}: {}",
                    result.id,
                    result.status.label(),
                    message,
                    w0 = widths[0],
                );
            }
        }
    }

    output
}

/// Format the per-benchmark detail block
fn format_details(output: &mut String, result: &BenchmarkReportResult) {
    let _ = writeln!(output, "Result \"{}\" ({}):", result.id, result.status.label());

    if let Some(m) = &result.metrics {
        let _ = writeln!(
            output,
            "  {} ±({}) {} {}",
            number(m.score),
            percent(m.ci_level),
            number(m.error),
            result.unit
        );
        let _ = writeln!(
            output,
            "  (min, avg, max) = ({}, {}, {}), stdev = {}",
            number(m.min),
            number(m.score),
            number(m.max),
            number(m.std_dev)
        );
        let _ = writeln!(
            output,
            "  CI ({}): [{}, {}] (assumes normal distribution)",
            percent(m.ci_level),
            number(m.ci_lower),
            number(m.ci_upper)
        );
        if let Some(p) = &m.percentiles {
            for (label, value) in p.entries() {
                let _ = writeln!(output, "    {:>7} = {} {}", label, number(value), result.unit);
            }
        }
    }

    let _ = write!(
        output,
        "  forks: {} of {} completed",
        result.forks.completed, result.forks.requested
    );
    if result.forks.timed_out > 0 {
        let _ = write!(output, ", {} timed out", result.forks.timed_out);
    }
    if result.truncated {
        output.push_str(" (truncated)");
    }
    output.push('\n');

    if let Some(failure) = &result.failure {
        let _ = writeln!(output, "  error ({}): {}", failure.kind, failure.message);
    }
    for note in &result.notes {
        let _ = writeln!(output, "  note: {}", note);
    }
}

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();

    output.push('\n');
    for result in &report.results {
        format_details(&mut output, result);
        output.push('\n');
    }

    output.push_str(&format_table(report));

    let s = &report.summary;
    output.push('\n');
    let _ = writeln!(
        output,
        "Total: {}  Passed: {}  Partial: {}  Config errors: {}  Crashed: {}",
        s.total_benchmarks, s.passed, s.partial, s.config_errors, s.crashed
    );
    let _ = writeln!(output, "Duration: {:.2} ms", s.total_duration_ms);

    output
}
