use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, AppResult, ScenarioError, ValidationError};
use crate::shutdown::is_shutdown;

use super::dispatch::ScenarioStream;
use super::orchestrator::Orchestrator;
use super::types::{ScenarioConfig, ScenarioReport};

/// What a failed scenario does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Continue,
    Abort,
}

impl FromStr for ErrorPolicy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Ok(ErrorPolicy::Continue),
            "abort" => Ok(ErrorPolicy::Abort),
            _ => Err(ValidationError::InvalidErrorPolicy {
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPolicy::Continue => f.write_str("continue"),
            ErrorPolicy::Abort => f.write_str("abort"),
        }
    }
}

/// A scenario together with the streams that carry its requests.
#[derive(Clone)]
pub struct ScenarioPlan {
    pub config: ScenarioConfig,
    pub streams: Vec<ScenarioStream>,
}

#[derive(Debug)]
pub struct ScenarioFailure {
    pub scenario: String,
    pub error: AppError,
}

/// Everything a batch of scenarios produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<ScenarioReport>,
    pub failures: Vec<ScenarioFailure>,
    /// Set when a failure stopped the batch under `ErrorPolicy::Abort`.
    pub aborted: bool,
    /// Set when cancellation skipped the remaining scenarios.
    pub cancelled: bool,
    pub total: usize,
}

impl RunSummary {
    /// Collapses the summary into the run's overall result.
    ///
    /// # Errors
    ///
    /// Returns `Aborted` when the batch was aborted, otherwise
    /// `ScenariosFailed` when any scenario failed.
    pub fn into_result(self) -> AppResult<Vec<ScenarioReport>> {
        if self.aborted
            && let Some(failure) = self.failures.last()
        {
            return Err(AppError::scenario(ScenarioError::Aborted {
                scenario: failure.scenario.clone(),
            }));
        }
        if !self.failures.is_empty() {
            return Err(AppError::scenario(ScenarioError::ScenariosFailed {
                failed: self.failures.len(),
                total: self.total,
            }));
        }
        Ok(self.reports)
    }
}

impl Orchestrator {
    /// Runs scenarios in order. A failing scenario is logged and recorded;
    /// the policy decides whether the next one still runs.
    pub async fn run_all(&self, plans: &[ScenarioPlan], policy: ErrorPolicy) -> RunSummary {
        let mut summary = RunSummary {
            total: plans.len(),
            ..RunSummary::default()
        };
        for plan in plans {
            if is_shutdown(self.cancel()) {
                info!("Cancellation requested; skipping remaining scenarios");
                summary.cancelled = true;
                break;
            }
            match self.run(&plan.config, &plan.streams).await {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    let failure = ScenarioError::Failed {
                        scenario: plan.config.name.clone(),
                        source: Box::new(err),
                    };
                    error!("{}", failure);
                    summary.failures.push(ScenarioFailure {
                        scenario: plan.config.name.clone(),
                        error: AppError::scenario(failure),
                    });
                    if policy == ErrorPolicy::Abort {
                        error!("Aborting run (on_error = abort)");
                        summary.aborted = true;
                        break;
                    }
                }
            }
        }
        summary
    }
}
