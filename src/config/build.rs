use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{DEFAULT_CACHE_CAPACITY, HttpMethod, ParamTemplate, RequestSpec, ResponseCache};
use crate::lifecycle::{
    DEFAULT_HEALTH_BACKOFF, DEFAULT_HEALTH_RETRIES, DEFAULT_STOP_TIMEOUT, ServiceCommand,
    StartupPolicy,
};
use crate::scenario::{
    DEFAULT_BATCH_MULTIPLIER, DEFAULT_CHECKPOINT_INTERVAL, DEFAULT_REQUESTS_PER_LEVEL,
    DEFAULT_SCALABILITY_LEVELS, ErrorPolicy, ScenarioConfig, ScenarioKind, levels_are_valid,
};

use super::parse_header;
use super::types::{
    ConfigFile, DurationValue, RequestSection, RunSection, ScenarioSection, ServiceSection,
    StreamSection, TargetSection,
};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_HEALTH_PATH: &str = "/health";
pub const DEFAULT_OUTPUT_DIR: &str = "perf-results";
const DEFAULT_STREAM_NAME: &str = "default";

/// A fully validated run description.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub target: TargetSettings,
    pub service: Option<ServiceSettings>,
    pub on_error: ErrorPolicy,
    pub output_dir: PathBuf,
    pub cache_capacity: usize,
    pub scenarios: Vec<ScenarioDefinition>,
}

#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub base_url: Url,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// `None` when the service is managed outside stressgate.
    pub command: Option<ServiceCommand>,
    pub health_path: String,
    pub health_timeout: Duration,
    pub policy: StartupPolicy,
}

#[derive(Debug, Clone)]
pub struct ScenarioDefinition {
    pub config: ScenarioConfig,
    pub streams: Vec<StreamDefinition>,
}

#[derive(Debug, Clone)]
pub struct StreamDefinition {
    pub name: String,
    pub weight: usize,
    pub requests: Vec<RequestDefinition>,
}

#[derive(Debug, Clone)]
pub struct RequestDefinition {
    pub name: Option<String>,
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub expect_status: Vec<u16>,
    pub capture: Option<String>,
}

impl RequestDefinition {
    /// Builds the dispatchable spec; templated paths are rendered per index
    /// and joined onto the target's base URL.
    #[must_use]
    pub fn to_spec(&self, cache: &Arc<ResponseCache>) -> RequestSpec {
        let templated_path = self.path.contains("{{");
        let template = ParamTemplate {
            path: templated_path.then(|| self.path.clone()),
            query: self.query.clone(),
            body: self.body.clone(),
        };
        let endpoint = if templated_path { "" } else { self.path.as_str() };
        let mut spec = RequestSpec::new(self.method, endpoint)
            .with_params(template.into_source(Arc::clone(cache)));
        spec.name = self.name.clone();
        spec.headers = self.headers.clone();
        spec.expect_status = self.expect_status.clone();
        spec.capture = self.capture.clone();
        spec
    }
}

impl RunConfig {
    /// Picks the named scenarios in config order; all of them when `names`
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns an error for a name that no scenario carries.
    pub fn select(&self, names: &[String]) -> AppResult<Vec<ScenarioDefinition>> {
        if names.is_empty() {
            return Ok(self.scenarios.clone());
        }
        for name in names {
            if !self
                .scenarios
                .iter()
                .any(|scenario| &scenario.config.name == name)
            {
                return Err(AppError::config(ConfigError::UnknownScenarioName {
                    name: name.clone(),
                }));
            }
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|scenario| names.contains(&scenario.config.name))
            .cloned()
            .collect())
    }
}

/// Validates a parsed file into a `RunConfig`. Nothing is dispatched before
/// this succeeds.
///
/// # Errors
///
/// Returns the first configuration error found.
pub fn build_run_config(file: ConfigFile) -> AppResult<RunConfig> {
    let target_section = file.target.ok_or_else(|| {
        AppError::config(ConfigError::MissingField { field: "target" })
    })?;
    let default_timeout = optional_duration(target_section.timeout.as_ref(), "target.timeout")?
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
    let target = build_target(target_section)?;
    let service = file.service.map(build_service).transpose()?;
    let (on_error, output_dir, cache_capacity) = build_run_section(&file.run)?;

    if file.scenarios.is_empty() {
        return Err(AppError::config(ConfigError::NoScenarios));
    }
    let mut seen = BTreeSet::new();
    let mut scenarios = Vec::with_capacity(file.scenarios.len());
    for section in file.scenarios {
        if !seen.insert(section.name.clone()) {
            return Err(AppError::config(ConfigError::DuplicateScenario {
                name: section.name,
            }));
        }
        scenarios.push(build_scenario(section, default_timeout)?);
    }

    Ok(RunConfig {
        target,
        service,
        on_error,
        output_dir,
        cache_capacity,
        scenarios,
    })
}

fn build_target(section: TargetSection) -> AppResult<TargetSettings> {
    let raw = section.base_url.ok_or_else(|| {
        AppError::config(ConfigError::MissingField {
            field: "target.base_url",
        })
    })?;
    let base_url = Url::parse(&raw).map_err(|err| {
        AppError::config(ConfigError::InvalidBaseUrl {
            url: raw.clone(),
            source: err,
        })
    })?;
    Ok(TargetSettings {
        base_url,
        headers: parse_headers(&section.headers)?,
    })
}

fn build_service(section: ServiceSection) -> AppResult<ServiceSettings> {
    let command = match section.command {
        Some(program) if program.trim().is_empty() => {
            return Err(AppError::config(ConfigError::EmptyServiceCommand));
        }
        Some(program) => Some(ServiceCommand {
            program,
            args: section.args,
            env: section.env.into_iter().collect(),
            workdir: section.workdir.map(PathBuf::from),
        }),
        None => None,
    };
    let policy = StartupPolicy {
        retries: section
            .health_retries
            .unwrap_or(DEFAULT_HEALTH_RETRIES)
            .max(1),
        backoff: optional_duration(section.health_backoff.as_ref(), "service.health_backoff")?
            .unwrap_or(DEFAULT_HEALTH_BACKOFF),
        stop_timeout: optional_duration(section.stop_timeout.as_ref(), "service.stop_timeout")?
            .unwrap_or(DEFAULT_STOP_TIMEOUT),
    };
    Ok(ServiceSettings {
        command,
        health_path: section
            .health_path
            .unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_owned()),
        health_timeout: optional_duration(
            section.health_timeout.as_ref(),
            "service.health_timeout",
        )?
        .unwrap_or(DEFAULT_HEALTH_TIMEOUT),
        policy,
    })
}

fn build_run_section(section: &RunSection) -> AppResult<(ErrorPolicy, PathBuf, usize)> {
    let on_error = match section.on_error.as_deref() {
        Some(value) => value.parse::<ErrorPolicy>().map_err(|_err| {
            AppError::config(ConfigError::InvalidErrorPolicy {
                value: value.to_owned(),
            })
        })?,
        None => ErrorPolicy::default(),
    };
    let output_dir = PathBuf::from(
        section
            .output_dir
            .as_deref()
            .unwrap_or(DEFAULT_OUTPUT_DIR),
    );
    let cache_capacity = section
        .cache_capacity
        .unwrap_or(DEFAULT_CACHE_CAPACITY)
        .max(1);
    Ok((on_error, output_dir, cache_capacity))
}

fn build_scenario(
    section: ScenarioSection,
    default_timeout: Duration,
) -> AppResult<ScenarioDefinition> {
    let name = section.name;
    let kind_text = section.kind.ok_or_else(|| {
        AppError::config(ConfigError::ScenarioMissingField {
            scenario: name.clone(),
            field: "type",
        })
    })?;
    let kind = kind_text.parse::<ScenarioKind>().map_err(|kind| {
        AppError::config(ConfigError::UnknownScenarioKind {
            scenario: name.clone(),
            kind,
        })
    })?;

    let concurrency = match (section.concurrency, kind) {
        (Some(concurrency), _) => concurrency,
        (None, ScenarioKind::Smoke | ScenarioKind::Scalability) => 1,
        (None, ScenarioKind::Load | ScenarioKind::Stress | ScenarioKind::Endurance) => {
            return Err(AppError::config(ConfigError::ScenarioMissingField {
                scenario: name,
                field: "concurrency",
            }));
        }
    };
    if concurrency == 0 {
        return Err(AppError::config(ConfigError::ConcurrencyZero { scenario: name }));
    }

    let scenario_duration = |value: Option<&DurationValue>| -> AppResult<Option<Duration>> {
        value
            .map(|value| {
                value.to_duration().map_err(|err| {
                    AppError::config(ConfigError::InvalidScenarioDuration {
                        scenario: name.clone(),
                        source: err,
                    })
                })
            })
            .transpose()
    };
    let duration = scenario_duration(section.duration.as_ref())?;
    if kind.is_timed() && duration.is_none() {
        return Err(AppError::config(ConfigError::DurationRequired { scenario: name }));
    }
    let warm_up = match section.warm_up_time.as_ref() {
        Some(value) if value.is_zero() => None,
        other => scenario_duration(other)?,
    };
    let request_timeout = scenario_duration(section.timeout.as_ref())?.unwrap_or(default_timeout);

    let levels = match section.levels {
        Some(levels) => levels,
        None if kind == ScenarioKind::Scalability => DEFAULT_SCALABILITY_LEVELS.to_vec(),
        None => Vec::new(),
    };
    if kind == ScenarioKind::Scalability && !levels_are_valid(&levels) {
        return Err(AppError::config(ConfigError::InvalidLevels { scenario: name }));
    }

    check_fraction(&name, "stop_on_failure", section.stop_on_failure)?;
    check_fraction(&name, "thresholds.error_rate", section.thresholds.error_rate)?;
    let requests_per_level = positive(
        &name,
        "requests_per_level",
        section.requests_per_level,
        DEFAULT_REQUESTS_PER_LEVEL,
    )?;
    let batch_multiplier = positive(
        &name,
        "batch_multiplier",
        section.batch_multiplier,
        DEFAULT_BATCH_MULTIPLIER,
    )?;
    let checkpoint_interval = positive(
        &name,
        "checkpoint_interval",
        section.checkpoint_interval,
        DEFAULT_CHECKPOINT_INTERVAL,
    )?;
    if let Some(max) = section.max_concurrency
        && max < concurrency
    {
        return Err(AppError::config(
            ConfigError::MaxConcurrencyBelowConcurrency { scenario: name },
        ));
    }

    let streams = build_streams(&name, &section.requests, section.streams)?;

    Ok(ScenarioDefinition {
        config: ScenarioConfig {
            name,
            kind,
            concurrency,
            spawn_rate: section.spawn_rate.unwrap_or(0),
            max_concurrency: section.max_concurrency,
            duration,
            warm_up,
            request_timeout,
            success_rate_floor: section.stop_on_failure,
            levels,
            requests_per_level,
            batch_multiplier,
            checkpoint_interval,
            thresholds: section.thresholds,
        },
        streams,
    })
}

fn build_streams(
    scenario: &str,
    requests: &[RequestSection],
    streams: Vec<StreamSection>,
) -> AppResult<Vec<StreamDefinition>> {
    let no_requests = || {
        AppError::config(ConfigError::NoRequests {
            scenario: scenario.to_owned(),
        })
    };
    match (requests.is_empty(), streams.is_empty()) {
        (false, false) => Err(AppError::config(ConfigError::RequestsAndStreams {
            scenario: scenario.to_owned(),
        })),
        (true, true) => Err(no_requests()),
        (false, true) => Ok(vec![StreamDefinition {
            name: DEFAULT_STREAM_NAME.to_owned(),
            weight: 1,
            requests: build_requests(requests)?,
        }]),
        (true, false) => streams
            .into_iter()
            .map(|stream| {
                if stream.requests.is_empty() {
                    return Err(no_requests());
                }
                if stream.weight == Some(0) {
                    return Err(AppError::config(ConfigError::FieldMustBePositive {
                        scenario: scenario.to_owned(),
                        field: "streams.weight",
                    }));
                }
                Ok(StreamDefinition {
                    name: stream.name,
                    weight: stream.weight.unwrap_or(1),
                    requests: build_requests(&stream.requests)?,
                })
            })
            .collect(),
    }
}

fn build_requests(sections: &[RequestSection]) -> AppResult<Vec<RequestDefinition>> {
    sections
        .iter()
        .map(|section| {
            Ok(RequestDefinition {
                name: section.name.clone(),
                method: section.method.unwrap_or(HttpMethod::Get),
                path: section.path.clone(),
                query: section
                    .query
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
                body: section.body.clone(),
                headers: parse_headers(&section.headers)?,
                expect_status: section.expect_status.clone(),
                capture: section.capture.clone(),
            })
        })
        .collect()
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    headers
        .iter()
        .map(|header| {
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))
        })
        .collect()
}

fn optional_duration(
    value: Option<&DurationValue>,
    field: &'static str,
) -> AppResult<Option<Duration>> {
    value
        .map(|value| {
            value
                .to_duration()
                .map_err(|err| AppError::config(ConfigError::InvalidDuration { field, source: err }))
        })
        .transpose()
}

fn check_fraction(scenario: &str, field: &'static str, value: Option<f64>) -> AppResult<()> {
    match value {
        Some(fraction) if !(0.0..=1.0).contains(&fraction) => {
            Err(AppError::config(ConfigError::FractionOutOfRange {
                scenario: scenario.to_owned(),
                field,
            }))
        }
        Some(_) | None => Ok(()),
    }
}

fn positive(
    scenario: &str,
    field: &'static str,
    value: Option<usize>,
    default: usize,
) -> AppResult<usize> {
    match value {
        Some(0) => Err(AppError::config(ConfigError::FieldMustBePositive {
            scenario: scenario.to_owned(),
            field,
        })),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}
