//! Configuration: file loading, duration and header parsing, and validation
//! into runnable scenario definitions.
mod build;
mod loader;
mod parse;
pub mod types;

#[cfg(test)]
mod tests;

pub use build::{
    DEFAULT_HEALTH_PATH, DEFAULT_HEALTH_TIMEOUT, DEFAULT_OUTPUT_DIR, DEFAULT_REQUEST_TIMEOUT,
    RequestDefinition, RunConfig, ScenarioDefinition, ServiceSettings, StreamDefinition,
    TargetSettings, build_run_config,
};
pub use loader::load_config;

#[cfg(test)]
pub(crate) use loader::load_config_file;
pub(crate) use parse::{parse_duration_value, parse_header};
