use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{AppError, AppResult, MetricsError};

use super::thresholds::{PerformanceStatus, ThresholdConfig};
use super::types::{CapacityReport, LatencyStats, MetricSnapshot};

const MS_PER_SEC: f64 = 1000.0;
pub const TREND_FILE_NAME: &str = "trend.csv";
const TREND_HEADER: &str = "timestamp,scenario,kind,final_state,duration_seconds,total_requests,total_failures,error_rate,p50_ms,p95_ms,p99_ms,requests_per_second,passed\n";

/// Response times in milliseconds, as written to snapshot files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimes {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl From<&LatencyStats> for ResponseTimes {
    fn from(stats: &LatencyStats) -> Self {
        Self {
            min: stats.min * MS_PER_SEC,
            max: stats.max * MS_PER_SEC,
            avg: stats.avg * MS_PER_SEC,
            median: stats.median * MS_PER_SEC,
            p90: stats.p90 * MS_PER_SEC,
            p95: stats.p95 * MS_PER_SEC,
            p99: stats.p99 * MS_PER_SEC,
        }
    }
}

/// The persisted, immutable record of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub scenario: String,
    pub kind: String,
    pub timestamp: String,
    pub final_state: String,
    pub duration_seconds: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub total_failures: u64,
    pub error_rate: f64,
    pub response_times: ResponseTimes,
    pub requests_per_second: f64,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    pub performance_status: PerformanceStatus,
    pub thresholds: ThresholdConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<CapacityReport>,
}

/// Identity of the run a snapshot belongs to.
#[derive(Debug, Clone)]
pub struct SnapshotContext<'run> {
    pub scenario: &'run str,
    pub kind: &'run str,
    pub final_state: &'run str,
    pub stop_reason: Option<String>,
    pub capacity: Option<CapacityReport>,
    pub thresholds: ThresholdConfig,
    pub taken_at: DateTime<Utc>,
}

impl SnapshotRecord {
    #[must_use]
    pub fn new(snapshot: &MetricSnapshot, context: SnapshotContext<'_>) -> Self {
        let performance_status = context.thresholds.evaluate(snapshot);
        Self {
            scenario: context.scenario.to_owned(),
            kind: context.kind.to_owned(),
            timestamp: context
                .taken_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            final_state: context.final_state.to_owned(),
            duration_seconds: snapshot.wall_clock_secs,
            total_requests: snapshot.total_requests,
            successful_requests: snapshot.successful_requests,
            total_failures: snapshot.failed_requests,
            error_rate: snapshot.error_rate(),
            response_times: ResponseTimes::from(&snapshot.latency),
            requests_per_second: snapshot.throughput,
            status_codes: snapshot.status_codes.to_labelled(),
            errors: snapshot.errors.clone(),
            performance_status,
            thresholds: context.thresholds,
            stop_reason: context.stop_reason,
            capacity: context.capacity,
        }
    }

    fn trend_row(&self) -> String {
        format!(
            "{},{},{},{},{:.3},{},{},{:.6},{:.3},{:.3},{:.3},{:.3},{}\n",
            self.timestamp,
            csv_field(&self.scenario),
            self.kind,
            self.final_state,
            self.duration_seconds,
            self.total_requests,
            self.total_failures,
            self.error_rate,
            self.response_times.median,
            self.response_times.p95,
            self.response_times.p99,
            self.requests_per_second,
            u8::from(self.performance_status.passed()),
        )
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

/// Writes snapshot documents and the trend table into one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn trend_path(&self) -> PathBuf {
        self.dir.join(TREND_FILE_NAME)
    }

    /// Writes the record as a new JSON file and appends its trend row.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created, a snapshot with
    /// the same name already exists, or either file cannot be written.
    pub async fn persist(&self, record: &SnapshotRecord) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
            AppError::metrics(MetricsError::CreateOutputDir {
                path: self.dir.clone(),
                source: err,
            })
        })?;

        let path = self.dir.join(snapshot_file_name(record));
        let json = serde_json::to_vec_pretty(record)
            .map_err(|err| AppError::metrics(MetricsError::SerializeSnapshot { source: err }))?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::AlreadyExists {
                    AppError::metrics(MetricsError::SnapshotExists { path: path.clone() })
                } else {
                    AppError::metrics(MetricsError::WriteSnapshot {
                        path: path.clone(),
                        source: err,
                    })
                }
            })?;
        let write_result = async {
            file.write_all(&json).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        write_result.map_err(|err| {
            AppError::metrics(MetricsError::WriteSnapshot {
                path: path.clone(),
                source: err,
            })
        })?;

        self.append_trend(record).await?;
        info!("Snapshot written to {}", path.display());
        Ok(path)
    }

    async fn append_trend(&self, record: &SnapshotRecord) -> AppResult<()> {
        let path = self.trend_path();
        let map_err = |err: std::io::Error| {
            AppError::metrics(MetricsError::AppendTrend {
                path: path.clone(),
                source: err,
            })
        };
        let is_new = !tokio::fs::try_exists(&path).await.map_err(map_err)?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(map_err)?;
        if is_new {
            file.write_all(TREND_HEADER.as_bytes())
                .await
                .map_err(map_err)?;
        }
        file.write_all(record.trend_row().as_bytes())
            .await
            .map_err(map_err)?;
        file.flush().await.map_err(map_err)
    }
}

fn snapshot_file_name(record: &SnapshotRecord) -> String {
    let stamp: String = record
        .timestamp
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '.')
        .collect();
    let scenario: String = record
        .scenario
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{}-{}.json", scenario, stamp)
}
