use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::MetricSnapshot;

const MS_PER_SEC: f64 = 1000.0;

/// Pass/fail limits for one scenario. Latency ceilings are in milliseconds,
/// `error_rate` is a fraction, `throughput` is a floor in requests/second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_p50: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_p90: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_p95: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_p99: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throughput: Option<f64>,
}

/// Per-metric verdicts keyed by threshold name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceStatus(pub BTreeMap<String, bool>);

impl PerformanceStatus {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.0.values().all(|passed| *passed)
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl ThresholdConfig {
    /// Checks every configured limit against the snapshot.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> PerformanceStatus {
        let latency = &snapshot.latency;
        let mut status = BTreeMap::new();
        let ceilings = [
            ("response_time_p50", self.response_time_p50, latency.median),
            ("response_time_p90", self.response_time_p90, latency.p90),
            ("response_time_p95", self.response_time_p95, latency.p95),
            ("response_time_p99", self.response_time_p99, latency.p99),
        ];
        for (name, limit_ms, actual_secs) in ceilings {
            if let Some(limit_ms) = limit_ms {
                status.insert(name.to_owned(), actual_secs * MS_PER_SEC <= limit_ms);
            }
        }
        if let Some(limit) = self.error_rate {
            status.insert("error_rate".to_owned(), snapshot.error_rate() <= limit);
        }
        if let Some(floor) = self.throughput {
            status.insert("throughput".to_owned(), snapshot.throughput >= floor);
        }
        PerformanceStatus(status)
    }
}
