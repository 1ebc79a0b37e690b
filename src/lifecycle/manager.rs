use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, LifecycleError};
use crate::shutdown::{ShutdownReceiver, is_shutdown, wait_for_shutdown};

use super::probe::HealthProbe;
use super::process::ServiceProcess;

pub const DEFAULT_HEALTH_RETRIES: u32 = 30;
pub const DEFAULT_HEALTH_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPolicy {
    /// Health checks attempted before giving up.
    pub retries: u32,
    /// Fixed pause between failed checks.
    pub backoff: Duration,
    /// Grace period between SIGTERM and a forced kill.
    pub stop_timeout: Duration,
}

impl Default for StartupPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_HEALTH_RETRIES,
            backoff: DEFAULT_HEALTH_BACKOFF,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Spawned,
    Stopped,
}

/// Owns one service process and its health probe.
///
/// `stop` acts at most once, no matter how often it is called or how far
/// `start` got.
pub struct LifecycleManager {
    process: Box<dyn ServiceProcess>,
    probe: Box<dyn HealthProbe>,
    policy: StartupPolicy,
    phase: Phase,
    cancel: Option<ShutdownReceiver>,
}

impl LifecycleManager {
    #[must_use]
    pub fn new(
        process: Box<dyn ServiceProcess>,
        probe: Box<dyn HealthProbe>,
        policy: StartupPolicy,
    ) -> Self {
        Self {
            process,
            probe,
            policy,
            phase: Phase::Idle,
            cancel: None,
        }
    }

    /// Abandon the health-check loop once `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: ShutdownReceiver) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Launches the service and polls its health endpoint.
    ///
    /// # Errors
    ///
    /// Returns `StartupFailure` once the retry budget is spent,
    /// `ExitedDuringStartup` when the process dies first, `StartupCancelled`
    /// when cancellation arrives while waiting, or the spawn error.
    pub async fn start(&mut self) -> AppResult<()> {
        self.process.spawn().await?;
        self.phase = Phase::Spawned;

        let attempts = self.policy.retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            if self.cancel.as_ref().is_some_and(is_shutdown) {
                return Err(cancelled(attempt.saturating_sub(1)));
            }
            if let Some(status) = self.process.exit_status()? {
                return Err(AppError::lifecycle(LifecycleError::ExitedDuringStartup {
                    status,
                }));
            }
            match self.probe.check().await {
                Ok(()) => {
                    info!("Service healthy after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(reason) => {
                    debug!("Health check {}/{} failed: {}", attempt, attempts, reason);
                    last_error = reason;
                }
            }
            if attempt < attempts && !self.backoff().await {
                return Err(cancelled(attempt));
            }
        }

        warn!("Service did not become healthy after {} attempts", attempts);
        Err(AppError::lifecycle(LifecycleError::StartupFailure {
            attempts,
            last_error,
        }))
    }

    /// Sleeps the backoff; `false` when cancellation cut it short.
    async fn backoff(&mut self) -> bool {
        let Some(cancel) = self.cancel.as_mut() else {
            tokio::time::sleep(self.policy.backoff).await;
            return true;
        };
        tokio::select! {
            () = tokio::time::sleep(self.policy.backoff) => true,
            () = wait_for_shutdown(cancel) => false,
        }
    }

    /// Terminates gracefully, then kills after the stop timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be signalled, waited on, or
    /// killed.
    pub async fn stop(&mut self) -> AppResult<()> {
        if self.phase != Phase::Spawned {
            self.phase = Phase::Stopped;
            return Ok(());
        }
        self.phase = Phase::Stopped;

        if let Err(err) = self.process.terminate().await {
            warn!("Graceful termination failed: {}", err);
            return self.process.kill().await;
        }
        if self.process.wait_exit(self.policy.stop_timeout).await? {
            debug!("Service stopped gracefully");
            return Ok(());
        }
        warn!(
            "Service still running after {}ms; killing it",
            self.policy.stop_timeout.as_millis()
        );
        self.process.kill().await
    }
}

fn cancelled(attempts: u32) -> AppError {
    info!("Startup cancelled after {} health check(s)", attempts);
    AppError::lifecycle(LifecycleError::StartupCancelled { attempts })
}

/// Runs `body` between `start` and `stop`; `stop` runs on every path,
/// including a `start` that spawned the process and then failed.
///
/// # Errors
///
/// Returns the startup or body error first; a stop error is returned only
/// when everything before it succeeded.
pub async fn with_service<F, Fut, T>(manager: &mut LifecycleManager, body: F) -> AppResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let outcome = match manager.start().await {
        Ok(()) => body().await,
        Err(err) => Err(err),
    };
    let stopped = manager.stop().await;
    match (outcome, stopped) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(stop_err)) => Err(stop_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(stop_err)) => {
            warn!("Failed to stop service after error: {}", stop_err);
            Err(err)
        }
    }
}
