//! Metrics aggregation, threshold evaluation, and snapshot persistence.
mod aggregate;
mod snapshot;
mod thresholds;
mod types;


pub use aggregate::{MetricTotals, aggregate, latency_stats, percentile};
pub use snapshot::{
    ResponseTimes, SnapshotContext, SnapshotRecord, SnapshotStore, TREND_FILE_NAME,
};
pub use thresholds::{PerformanceStatus, ThresholdConfig};
pub use types::{
    CapacityReport, LatencyStats, LevelResult, MetricSnapshot, RequestResult, StatusHistogram,
};
