use std::fmt::Write;

use crate::scenario::{RunSummary, ScenarioReport};

const NAME_HEADER: &str = "SCENARIO";
const MS_PER_SEC: f64 = 1000.0;

/// One line per scenario: state, totals, p95, rps, and threshold status.
pub(super) fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let width = summary
        .reports
        .iter()
        .map(|report| report.scenario.len())
        .chain(summary.failures.iter().map(|failure| failure.scenario.len()))
        .chain(std::iter::once(NAME_HEADER.len()))
        .max()
        .unwrap_or(NAME_HEADER.len());

    let _written = writeln!(
        out,
        "{:<width$}  {:<11}  {:<9}  {:>9}  {:>8}  {:>10}  {:>9}  STATUS",
        NAME_HEADER,
        "TYPE",
        "STATE",
        "REQUESTS",
        "FAILED",
        "P95(ms)",
        "RPS",
        width = width
    );
    for report in &summary.reports {
        let _written = writeln!(
            out,
            "{:<width$}  {:<11}  {:<9}  {:>9}  {:>8}  {:>10.1}  {:>9.1}  {}",
            report.scenario,
            report.kind.as_str(),
            report.final_state.as_str(),
            report.snapshot.total_requests,
            report.snapshot.failed_requests,
            report.snapshot.latency.p95 * MS_PER_SEC,
            report.snapshot.throughput,
            report_status(report),
            width = width
        );
    }
    for failure in &summary.failures {
        let _written = writeln!(
            out,
            "{:<width$}  error: {}",
            failure.scenario,
            failure.error,
            width = width
        );
    }

    let completed = summary.reports.len();
    let skipped = summary
        .total
        .saturating_sub(completed)
        .saturating_sub(summary.failures.len());
    let _written = write!(
        out,
        "{} of {} scenario(s) completed, {} failed",
        completed,
        summary.total,
        summary.failures.len()
    );
    if skipped > 0 {
        let reason = if summary.cancelled {
            "cancelled"
        } else {
            "aborted"
        };
        let _written = write!(out, ", {} skipped ({})", skipped, reason);
    }
    out.push('\n');
    out
}

fn report_status(report: &ScenarioReport) -> String {
    if report.passed() {
        return "PASS".to_owned();
    }
    format!("FAIL ({})", report.performance.failures().join(", "))
}
