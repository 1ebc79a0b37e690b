use thiserror::Error;

use super::{
    ConfigError, HttpError, LifecycleError, MetricsError, RegressionError, ScenarioError,
    ValidationError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("Service lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("Regression check error: {0}")]
    Regression(#[from] RegressionError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation<E>(error: E) -> Self
    where
        E: Into<ValidationError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn http<E>(error: E) -> Self
    where
        E: Into<HttpError>,
    {
        error.into().into()
    }

    pub fn metrics<E>(error: E) -> Self
    where
        E: Into<MetricsError>,
    {
        error.into().into()
    }

    pub fn lifecycle<E>(error: E) -> Self
    where
        E: Into<LifecycleError>,
    {
        error.into().into()
    }

    pub fn scenario<E>(error: E) -> Self
    where
        E: Into<ScenarioError>,
    {
        error.into().into()
    }

    pub fn regression<E>(error: E) -> Self
    where
        E: Into<RegressionError>,
    {
        error.into().into()
    }

    /// Configuration-class failures are raised before any request is sent.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Config(_))
    }
}
