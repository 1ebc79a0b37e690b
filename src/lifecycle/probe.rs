use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::{AppError, AppResult, LifecycleError};

#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `Err` carries a human-readable reason for the failed check.
    async fn check(&self) -> Result<(), String>;
}

/// GET against the service's health endpoint; any 2xx is healthy.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: Client,
    url: Url,
}

impl HttpHealthProbe {
    /// # Errors
    ///
    /// Returns an error when the health path cannot be joined onto the base
    /// URL or the client cannot be built.
    pub fn new(base_url: &Url, health_path: &str, timeout: Duration) -> AppResult<Self> {
        let url = base_url.join(health_path).map_err(|err| {
            AppError::lifecycle(LifecycleError::InvalidHealthUrl {
                url: format!("{}{}", base_url, health_path),
                source: err,
            })
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::lifecycle(LifecycleError::HealthClient { source: err }))?;
        Ok(Self { client, url })
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn check(&self) -> Result<(), String> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|err| format!("health check to {} failed: {}", self.url, err))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("health check to {} returned {}", self.url, status))
        }
    }
}
