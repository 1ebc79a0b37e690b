use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegressionError {
    #[error("Failed to read snapshot '{path}': {source}")]
    ReadSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed snapshot '{path}': {source}")]
    ParseSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Snapshot '{path}' must be a JSON object at the top level.")]
    NotAnObject { path: PathBuf },
    #[error("Threshold must be a finite value >= 0 (got {value}).")]
    InvalidThreshold { value: f64 },
}
