use super::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("No config file given and neither stressgate.toml nor stressgate.json exists.")]
    NotFound,
    #[error("Missing required field '{field}'.")]
    MissingField { field: &'static str },
    #[error("Config defines no scenarios.")]
    NoScenarios,
    #[error("Duplicate scenario name '{name}'.")]
    DuplicateScenario { name: String },
    #[error("Unknown scenario '{name}'.")]
    UnknownScenarioName { name: String },
    #[error("Scenario '{scenario}' has unknown type '{kind}'. Use smoke, load, stress, endurance, or scalability.")]
    UnknownScenarioKind { scenario: String, kind: String },
    #[error("Scenario '{scenario}' is missing required field '{field}'.")]
    ScenarioMissingField {
        scenario: String,
        field: &'static str,
    },
    #[error("Scenario '{scenario}': concurrency must be > 0.")]
    ConcurrencyZero { scenario: String },
    #[error("Scenario '{scenario}' requires a duration.")]
    DurationRequired { scenario: String },
    #[error("Scenario '{scenario}' defines no requests.")]
    NoRequests { scenario: String },
    #[error("Scenario '{scenario}' cannot define both 'requests' and 'streams'.")]
    RequestsAndStreams { scenario: String },
    #[error("Scenario '{scenario}': scalability levels must be non-empty, > 0, and ascending.")]
    InvalidLevels { scenario: String },
    #[error("Scenario '{scenario}': '{field}' must be between 0 and 1.")]
    FractionOutOfRange {
        scenario: String,
        field: &'static str,
    },
    #[error("Scenario '{scenario}': '{field}' must be >= 1.")]
    FieldMustBePositive {
        scenario: String,
        field: &'static str,
    },
    #[error("Scenario '{scenario}': max_concurrency must be >= concurrency.")]
    MaxConcurrencyBelowConcurrency { scenario: String },
    #[error("Scenario '{scenario}': invalid duration: {source}")]
    InvalidScenarioDuration {
        scenario: String,
        #[source]
        source: ValidationError,
    },
    #[error("Invalid '{field}' duration: {source}")]
    InvalidDuration {
        field: &'static str,
        #[source]
        source: ValidationError,
    },
    #[error("Invalid header: {source}")]
    InvalidHeader {
        #[source]
        source: ValidationError,
    },
    #[error("Invalid target base_url '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Service command must not be empty.")]
    EmptyServiceCommand,
    #[error("Invalid on_error policy '{value}'. Use continue or abort.")]
    InvalidErrorPolicy { value: String },
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
