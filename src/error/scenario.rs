use thiserror::Error;

use super::AppError;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario '{scenario}' failed: {source}")]
    Failed {
        scenario: String,
        #[source]
        source: Box<AppError>,
    },
    #[error("Run aborted after scenario '{scenario}' failed.")]
    Aborted { scenario: String },
    #[error("{failed} of {total} scenarios failed.")]
    ScenariosFailed { failed: usize, total: usize },
}
