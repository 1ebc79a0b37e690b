use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{LatencyStats, MetricSnapshot, RequestResult, StatusHistogram};

/// Distinct error messages kept per snapshot; the rest fold into one bucket.
const MAX_DISTINCT_ERRORS: usize = 50;
const OTHER_ERRORS_KEY: &str = "(other errors)";

/// Reduces a finished set of results into one snapshot.
///
/// `wall_clock` is the elapsed time of the batch (or run) as measured by the
/// caller; overlapping requests make it impossible to derive from latencies.
#[must_use]
pub fn aggregate(results: &[RequestResult], wall_clock: Duration) -> MetricSnapshot {
    let mut totals = MetricTotals::default();
    totals.record(results, wall_clock);
    totals.snapshot()
}

/// Running counters for results that have already been dropped.
///
/// Only the latencies are kept per request, since nearest-rank percentiles
/// need every sample.
#[derive(Debug, Clone, Default)]
pub struct MetricTotals {
    total: u64,
    successful: u64,
    latencies: Vec<f64>,
    status_codes: StatusHistogram,
    errors: BTreeMap<String, u64>,
    wall_clock: Duration,
}

impl MetricTotals {
    /// Folds one batch in; the results can be dropped afterwards.
    pub fn record(&mut self, results: &[RequestResult], wall_clock: Duration) {
        for result in results {
            self.total = self.total.saturating_add(1);
            if result.success {
                self.successful = self.successful.saturating_add(1);
            }
            if let Some(latency) = result.latency_secs
                && latency.is_finite()
                && latency >= 0.0
            {
                self.latencies.push(latency);
            }
            self.status_codes.record(result.status_code);
            if let Some(message) = result.error.as_deref() {
                record_error(&mut self.errors, message, 1);
            }
        }
        self.wall_clock = self.wall_clock.saturating_add(wall_clock);
    }

    /// Adds another set of totals, as if its batches were recorded here.
    pub fn merge(&mut self, other: &Self) {
        self.total = self.total.saturating_add(other.total);
        self.successful = self.successful.saturating_add(other.successful);
        self.latencies.extend_from_slice(&other.latencies);
        self.status_codes.merge(&other.status_codes);
        for (message, count) in &other.errors {
            record_error(&mut self.errors, message, *count);
        }
        self.wall_clock = self.wall_clock.saturating_add(other.wall_clock);
    }

    /// Sorts the stored latencies in place; already sorted prefixes keep
    /// repeated snapshots close to linear.
    pub fn snapshot(&mut self) -> MetricSnapshot {
        self.latencies.sort_by(f64::total_cmp);

        let total = self.total;
        let successful = self.successful;
        let success_rate = if total > 0 {
            successful as f64 / total as f64
        } else {
            0.0
        };
        let wall_clock_secs = self.wall_clock.as_secs_f64();
        let throughput = if wall_clock_secs > 0.0 {
            successful as f64 / wall_clock_secs
        } else {
            0.0
        };

        MetricSnapshot {
            total_requests: total,
            successful_requests: successful,
            failed_requests: total.saturating_sub(successful),
            success_rate,
            latency: latency_stats(&self.latencies),
            throughput,
            wall_clock_secs,
            status_codes: self.status_codes.clone(),
            errors: self.errors.clone(),
        }
    }
}

fn record_error(errors: &mut BTreeMap<String, u64>, message: &str, count: u64) {
    let key = if errors.contains_key(message) || errors.len() < MAX_DISTINCT_ERRORS {
        message
    } else {
        OTHER_ERRORS_KEY
    };
    let entry = errors.entry(key.to_owned()).or_insert(0);
    *entry = entry.saturating_add(count);
}

/// Latency summary of an ascending-sorted slice; all zeros when empty.
#[must_use]
pub fn latency_stats(sorted: &[f64]) -> LatencyStats {
    let (Some(min), Some(max)) = (sorted.first(), sorted.last()) else {
        return LatencyStats::default();
    };
    let sum: f64 = sorted.iter().sum();
    LatencyStats {
        min: *min,
        max: *max,
        avg: sum / sorted.len() as f64,
        median: percentile(sorted, 0.5),
        p90: percentile(sorted, 0.90),
        p95: percentile(sorted, 0.95),
        p99: percentile(sorted, 0.99),
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
///
/// `index = clamp(floor(len * p), 0, len - 1)`; an empty slice yields 0.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let rank = (sorted.len() as f64 * p).floor();
    let index = if rank.is_nan() || rank <= 0.0 {
        0
    } else {
        (rank as usize).min(last)
    };
    sorted.get(index).copied().unwrap_or(0.0)
}
