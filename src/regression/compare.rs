use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{AppError, AppResult, RegressionError};

pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// One metric whose relative change exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionEntry {
    /// Dot-separated path into the snapshot, e.g. `response_times.p95`.
    pub metric: String,
    pub baseline: f64,
    pub current: f64,
    /// `|current - baseline| / |baseline|`; infinite when the baseline is 0.
    pub relative_difference: f64,
}

/// Walks every numeric leaf of `baseline` and reports those whose relative
/// difference in `current` is strictly greater than `threshold`, most severe
/// first.
///
/// Keys missing from `current` are logged and skipped; keys only in
/// `current` and non-numeric leaves are ignored.
#[must_use]
pub fn compare(baseline: &Value, current: &Value, threshold: f64) -> Vec<RegressionEntry> {
    let mut entries = Vec::new();
    match (baseline, current) {
        (Value::Object(baseline), Value::Object(current)) => {
            walk(baseline, current, "", threshold, &mut entries);
        }
        (Value::Number(base), Value::Number(cur)) => {
            push_if_regressed("value", base.as_f64(), cur.as_f64(), threshold, &mut entries);
        }
        (Value::Object(_) | Value::Number(_), _) => {
            warn!("Snapshots have different shapes at the top level; nothing compared");
        }
        (Value::Null | Value::Bool(_) | Value::String(_) | Value::Array(_), _) => {}
    }
    entries.sort_by(|left, right| {
        right
            .relative_difference
            .total_cmp(&left.relative_difference)
            .then_with(|| left.metric.cmp(&right.metric))
    });
    entries
}

fn walk(
    baseline: &Map<String, Value>,
    current: &Map<String, Value>,
    prefix: &str,
    threshold: f64,
    entries: &mut Vec<RegressionEntry>,
) {
    for (key, base_value) in baseline {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let Some(cur_value) = current.get(key) else {
            warn!("Metric '{}' missing from current snapshot; skipped", path);
            continue;
        };
        match (base_value, cur_value) {
            (Value::Object(base_map), Value::Object(cur_map)) => {
                walk(base_map, cur_map, &path, threshold, entries);
            }
            (Value::Number(base), Value::Number(cur)) => {
                push_if_regressed(&path, base.as_f64(), cur.as_f64(), threshold, entries);
            }
            (Value::Object(_) | Value::Number(_), _) => {
                warn!("Metric '{}' changed type in current snapshot; skipped", path);
            }
            (Value::Null | Value::Bool(_) | Value::String(_) | Value::Array(_), _) => {}
        }
    }
}

fn push_if_regressed(
    path: &str,
    baseline: Option<f64>,
    current: Option<f64>,
    threshold: f64,
    entries: &mut Vec<RegressionEntry>,
) {
    let (Some(baseline), Some(current)) = (baseline, current) else {
        return;
    };
    let difference = relative_difference(baseline, current);
    if difference > threshold {
        entries.push(RegressionEntry {
            metric: path.to_owned(),
            baseline,
            current,
            relative_difference: difference,
        });
    }
}

/// `|current - baseline| / |baseline|`, with a zero baseline yielding 0 when
/// `current` is also 0 and infinity otherwise.
#[must_use]
pub fn relative_difference(baseline: f64, current: f64) -> f64 {
    if baseline == 0.0 {
        if current == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        (current - baseline).abs() / baseline.abs()
    }
}

/// # Errors
///
/// Returns an error for a negative or non-finite threshold.
pub fn validate_threshold(threshold: f64) -> AppResult<f64> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(AppError::regression(RegressionError::InvalidThreshold {
            value: threshold,
        }))
    }
}

/// Reads a persisted snapshot document.
///
/// # Errors
///
/// Returns an error when the file is missing, unreadable, not JSON, or not a
/// JSON object.
pub async fn load_snapshot(path: &Path) -> AppResult<Value> {
    let content = tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::regression(RegressionError::ReadSnapshot {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|err| {
        AppError::regression(RegressionError::ParseSnapshot {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    if !value.is_object() {
        return Err(AppError::regression(RegressionError::NotAnObject {
            path: path.to_path_buf(),
        }));
    }
    Ok(value)
}
