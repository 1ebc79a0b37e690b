mod app;
mod config;
mod http;
mod lifecycle;
mod metrics;
mod regression;
mod scenario;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use http::HttpError;
pub use lifecycle::LifecycleError;
pub use metrics::MetricsError;
pub use regression::RegressionError;
pub use scenario::ScenarioError;
pub use validation::ValidationError;
