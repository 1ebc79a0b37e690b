use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one dispatched request. Discarded after aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    /// `None` when no response was received (transport failure, timeout, cancel).
    pub status_code: Option<u16>,
    /// End-to-end latency in seconds, when it was measured.
    pub latency_secs: Option<f64>,
    pub success: bool,
    pub error: Option<String>,
}

impl RequestResult {
    #[must_use]
    pub fn success(status_code: u16, latency: Duration) -> Self {
        Self {
            status_code: Some(status_code),
            latency_secs: Some(latency.as_secs_f64()),
            success: true,
            error: None,
        }
    }

    /// A response arrived but did not satisfy the request's expectations.
    #[must_use]
    pub fn rejected(status_code: u16, latency: Duration, error: String) -> Self {
        Self {
            status_code: Some(status_code),
            latency_secs: Some(latency.as_secs_f64()),
            success: false,
            error: Some(error),
        }
    }

    #[must_use]
    pub fn transport_failure(latency: Option<Duration>, error: String) -> Self {
        Self {
            status_code: None,
            latency_secs: latency.map(|value| value.as_secs_f64()),
            success: false,
            error: Some(error),
        }
    }

    /// A request abandoned after the cancellation grace period.
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            status_code: None,
            latency_secs: None,
            success: false,
            error: Some("cancelled".to_owned()),
        }
    }
}

/// Latency distribution in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Status-code counts plus a bucket for requests that got no response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistogram {
    pub codes: BTreeMap<u16, u64>,
    pub no_response: u64,
}

impl StatusHistogram {
    pub fn record(&mut self, status_code: Option<u16>) {
        match status_code {
            Some(code) => {
                let entry = self.codes.entry(code).or_insert(0);
                *entry = entry.saturating_add(1);
            }
            None => self.no_response = self.no_response.saturating_add(1),
        }
    }

    pub fn merge(&mut self, other: &Self) {
        for (code, count) in &other.codes {
            let entry = self.codes.entry(*code).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
        self.no_response = self.no_response.saturating_add(other.no_response);
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.codes
            .values()
            .fold(self.no_response, |acc, count| acc.saturating_add(*count))
    }

    /// Flattened form used in persisted snapshots; the null bucket is `"null"`.
    #[must_use]
    pub fn to_labelled(&self) -> BTreeMap<String, u64> {
        let mut labelled: BTreeMap<String, u64> = self
            .codes
            .iter()
            .map(|(code, count)| (code.to_string(), *count))
            .collect();
        if self.no_response > 0 {
            labelled.insert("null".to_owned(), self.no_response);
        }
        labelled
    }
}

/// Aggregated view of one batch or one whole scenario run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Fraction in `0..=1`; zero when nothing was sent.
    pub success_rate: f64,
    pub latency: LatencyStats,
    /// Successful requests per second of wall clock.
    pub throughput: f64,
    pub wall_clock_secs: f64,
    pub status_codes: StatusHistogram,
    /// Distinct error messages with their occurrence counts.
    pub errors: BTreeMap<String, u64>,
}

impl MetricSnapshot {
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.failed_requests as f64 / self.total_requests as f64
    }
}

/// Capacity found by a scalability run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapacityReport {
    /// Highest concurrency level that met the success-rate floor.
    pub max_passing_level: Option<usize>,
    /// First level that fell below the floor.
    pub breaking_level: Option<usize>,
    pub success_rate_floor: f64,
    /// Success rate observed at every level that ran, in order.
    pub levels: Vec<LevelResult>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub level: usize,
    pub success_rate: f64,
    pub p95_ms: f64,
    pub throughput: f64,
}
