use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Service exited during startup with {status}.")]
    ExitedDuringStartup { status: String },
    #[error("Service never became healthy after {attempts} attempts: {last_error}")]
    StartupFailure { attempts: u32, last_error: String },
    #[error("Startup cancelled after {attempts} health checks.")]
    StartupCancelled { attempts: u32 },
    #[error("Failed to signal service process: {source}")]
    Signal {
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for service process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to kill service process: {source}")]
    Kill {
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid health endpoint '{url}': {source}")]
    InvalidHealthUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Failed to build health-check client: {source}")]
    HealthClient {
        #[source]
        source: reqwest::Error,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
