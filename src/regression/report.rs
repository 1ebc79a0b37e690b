use std::fmt::Write;

use super::compare::RegressionEntry;

const METRIC_HEADER: &str = "METRIC";
const PERCENT: f64 = 100.0;

/// Human-readable table of regressions, most severe first.
#[must_use]
pub fn render_report(entries: &[RegressionEntry], threshold: f64) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _written = writeln!(
            out,
            "No regressions detected (threshold {:.1}%).",
            threshold * PERCENT
        );
        return out;
    }

    let width = entries
        .iter()
        .map(|entry| entry.metric.len())
        .chain(std::iter::once(METRIC_HEADER.len()))
        .max()
        .unwrap_or(METRIC_HEADER.len());
    let _written = writeln!(
        out,
        "{} regression(s) above {:.1}% threshold:",
        entries.len(),
        threshold * PERCENT
    );
    let _written = writeln!(
        out,
        "{:<width$}  {:>14}  {:>14}  {:>10}",
        METRIC_HEADER,
        "BASELINE",
        "CURRENT",
        "CHANGE",
        width = width
    );
    for entry in entries {
        let _written = writeln!(
            out,
            "{:<width$}  {:>14.3}  {:>14.3}  {:>10}",
            entry.metric,
            entry.baseline,
            entry.current,
            format_change(entry),
            width = width
        );
    }
    out
}

fn format_change(entry: &RegressionEntry) -> String {
    if entry.relative_difference.is_infinite() {
        return "new".to_owned();
    }
    let sign = if entry.current >= entry.baseline { '+' } else { '-' };
    format!("{}{:.1}%", sign, entry.relative_difference * PERCENT)
}
