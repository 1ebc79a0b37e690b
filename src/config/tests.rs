use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use super::types::{ConfigFile, DurationValue};
use super::{
    DEFAULT_HEALTH_PATH, DEFAULT_REQUEST_TIMEOUT, RunConfig, build_run_config, load_config_file,
    parse_duration_value, parse_header,
};
use crate::error::{AppError, ConfigError};
use crate::http::{HttpMethod, RequestParamSource, ResponseCache};
use crate::scenario::{DEFAULT_SCALABILITY_LEVELS, ErrorPolicy, ScenarioKind};

const BASIC_TOML: &str = r#"
[target]
base_url = "http://127.0.0.1:8080"
timeout = "2s"
headers = ["X-Api-Key: secret"]

[service]
command = "./server"
args = ["--port", "8080"]
health_path = "/ready"
health_retries = 5
health_backoff = "200ms"

[run]
on_error = "abort"
output_dir = "out"

[[scenarios]]
name = "smoke"
type = "smoke"

[[scenarios.requests]]
path = "/health"

[[scenarios]]
name = "steady"
type = "load"
concurrency = 8
spawn_rate = 2
duration = "1m"
warm_up_time = "5s"
stop_on_failure = 0.9

[scenarios.thresholds]
response_time_p95 = 250.0
error_rate = 0.01

[[scenarios.requests]]
method = "post"
path = "/items"
body = { name = "item-{{index}}" }
expect_status = [201]
"#;

fn parse_toml(content: &str) -> Result<ConfigFile, String> {
    toml::from_str(content).map_err(|err| format!("parse failed: {}", err))
}

fn build(content: &str) -> Result<RunConfig, AppError> {
    let file = toml::from_str::<ConfigFile>(content)
        .map_err(|_err| AppError::config("fixture must parse"))?;
    build_run_config(file)
}

fn expect_config_error(content: &str) -> Result<ConfigError, String> {
    match build(content) {
        Ok(_) => Err("Expected config error".to_owned()),
        Err(AppError::Config(err)) => Ok(err),
        Err(other) => Err(format!("Unexpected error: {}", other)),
    }
}

fn with_target(scenarios: &str) -> String {
    format!(
        "[target]\nbase_url = \"http://127.0.0.1:9\"\n\n{}",
        scenarios
    )
}

#[test]
fn load_toml_file_from_disk() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("stressgate.toml");
    std::fs::write(&path, BASIC_TOML).map_err(|err| format!("write failed: {}", err))?;

    let file = load_config_file(&path).map_err(|err| err.to_string())?;
    if file.scenarios.len() != 2 {
        return Err(format!("Unexpected scenario count: {}", file.scenarios.len()));
    }
    Ok(())
}

#[test]
fn load_json_file_from_disk() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("stressgate.json");
    let content = r#"{
        "target": { "base_url": "http://127.0.0.1:8080" },
        "scenarios": [
            { "name": "ping", "type": "smoke", "requests": [{ "path": "/ping" }] }
        ]
    }"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let file = load_config_file(&path).map_err(|err| err.to_string())?;
    let config = build_run_config(file).map_err(|err| err.to_string())?;
    let scenario = config
        .scenarios
        .first()
        .ok_or_else(|| "Missing scenario".to_owned())?;
    if scenario.config.kind != ScenarioKind::Smoke || scenario.config.concurrency != 1 {
        return Err("Unexpected smoke scenario".to_owned());
    }
    Ok(())
}

#[test]
fn unsupported_extension_is_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("stressgate.yaml");
    std::fs::write(&path, "target: {}").map_err(|err| format!("write failed: {}", err))?;

    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        Err(other) => Err(format!("Unexpected error: {}", other)),
        Ok(_) => Err("Expected unsupported extension".to_owned()),
    }
}

#[test]
fn unknown_fields_are_rejected() -> Result<(), String> {
    let content = with_target("[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\nrate = 5\n");
    if toml::from_str::<ConfigFile>(&content).is_ok() {
        return Err("Expected unknown field to fail parsing".to_owned());
    }
    Ok(())
}

#[test]
fn basic_config_builds_runtime_values() -> Result<(), String> {
    let config = build(BASIC_TOML).map_err(|err| err.to_string())?;

    if config.target.base_url.as_str() != "http://127.0.0.1:8080/" {
        return Err(format!("Unexpected base url: {}", config.target.base_url));
    }
    if config.target.headers != vec![("X-Api-Key".to_owned(), "secret".to_owned())] {
        return Err("Unexpected headers".to_owned());
    }
    if config.on_error != ErrorPolicy::Abort {
        return Err("Expected abort policy".to_owned());
    }
    if config.output_dir != std::path::Path::new("out") {
        return Err("Unexpected output dir".to_owned());
    }

    let service = config
        .service
        .as_ref()
        .ok_or_else(|| "Expected service".to_owned())?;
    let command = service
        .command
        .as_ref()
        .ok_or_else(|| "Expected command".to_owned())?;
    if command.program != "./server" || command.args != ["--port", "8080"] {
        return Err("Unexpected service command".to_owned());
    }
    if service.health_path != "/ready"
        || service.policy.retries != 5
        || service.policy.backoff != Duration::from_millis(200)
    {
        return Err("Unexpected service settings".to_owned());
    }

    let steady = config
        .scenarios
        .get(1)
        .ok_or_else(|| "Missing steady".to_owned())?;
    let scenario = &steady.config;
    if scenario.kind != ScenarioKind::Load
        || scenario.concurrency != 8
        || scenario.spawn_rate != 2
        || scenario.duration != Some(Duration::from_secs(60))
        || scenario.warm_up != Some(Duration::from_secs(5))
        || scenario.request_timeout != Duration::from_secs(2)
        || scenario.success_rate_floor != Some(0.9)
    {
        return Err(format!("Unexpected load scenario: {:?}", scenario));
    }
    if scenario.thresholds.response_time_p95 != Some(250.0) {
        return Err("Expected p95 threshold".to_owned());
    }

    let stream = steady
        .streams
        .first()
        .ok_or_else(|| "Missing stream".to_owned())?;
    let request = stream
        .requests
        .first()
        .ok_or_else(|| "Missing request".to_owned())?;
    if stream.weight != 1 || request.method != HttpMethod::Post || request.expect_status != [201]
    {
        return Err("Unexpected request definition".to_owned());
    }
    Ok(())
}

#[test]
fn defaults_apply_when_sections_are_sparse() -> Result<(), String> {
    let content = with_target(
        "[service]\n\n[[scenarios]]\nname = \"grow\"\ntype = \"scalability\"\n\n[[scenarios.requests]]\npath = \"/\"\n",
    );
    let config = build(&content).map_err(|err| err.to_string())?;

    let service = config
        .service
        .as_ref()
        .ok_or_else(|| "Expected service".to_owned())?;
    if service.command.is_some() || service.health_path != DEFAULT_HEALTH_PATH {
        return Err("Expected externally managed service defaults".to_owned());
    }
    if config.on_error != ErrorPolicy::Continue {
        return Err("Expected continue policy".to_owned());
    }
    let scenario = config
        .scenarios
        .first()
        .ok_or_else(|| "Missing scenario".to_owned())?;
    if scenario.config.levels != DEFAULT_SCALABILITY_LEVELS
        || scenario.config.request_timeout != DEFAULT_REQUEST_TIMEOUT
        || scenario.config.warm_up.is_some()
    {
        return Err(format!("Unexpected defaults: {:?}", scenario.config));
    }
    Ok(())
}

#[test]
fn zero_warm_up_disables_warm_up() -> Result<(), String> {
    let content = with_target(
        "[[scenarios]]\nname = \"a\"\ntype = \"load\"\nconcurrency = 2\nduration = 10\nwarm_up_time = \"0s\"\n\n[[scenarios.requests]]\npath = \"/\"\n",
    );
    let config = build(&content).map_err(|err| err.to_string())?;
    let scenario = config
        .scenarios
        .first()
        .ok_or_else(|| "Missing scenario".to_owned())?;
    if scenario.config.warm_up.is_some() {
        return Err("Expected warm-up disabled".to_owned());
    }
    Ok(())
}

#[test]
fn missing_target_is_rejected() -> Result<(), String> {
    let err = expect_config_error("[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\n")?;
    match err {
        ConfigError::MissingField { field: "target" } => Ok(()),
        other => Err(format!("Unexpected error: {}", other)),
    }
}

#[test]
fn invalid_base_url_is_rejected() -> Result<(), String> {
    let err = expect_config_error("[target]\nbase_url = \"not a url\"\n")?;
    match err {
        ConfigError::InvalidBaseUrl { .. } => Ok(()),
        other => Err(format!("Unexpected error: {}", other)),
    }
}

#[test]
fn config_without_scenarios_is_rejected() -> Result<(), String> {
    match expect_config_error(&with_target(""))? {
        ConfigError::NoScenarios => Ok(()),
        other => Err(format!("Unexpected error: {}", other)),
    }
}

#[test]
fn scenario_validation_errors() -> Result<(), String> {
    let cases: [(&str, fn(&ConfigError) -> bool); 10] = [
        (
            "[[scenarios]]\nname = \"a\"\n",
            |err| matches!(err, ConfigError::ScenarioMissingField { field: "type", .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"spike\"\n",
            |err| matches!(err, ConfigError::UnknownScenarioKind { kind, .. } if kind == "spike"),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"load\"\nduration = 5\n",
            |err| matches!(err, ConfigError::ScenarioMissingField { field: "concurrency", .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\nconcurrency = 0\n",
            |err| matches!(err, ConfigError::ConcurrencyZero { .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"stress\"\nconcurrency = 2\n",
            |err| matches!(err, ConfigError::DurationRequired { .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"scalability\"\nlevels = [5, 1]\n",
            |err| matches!(err, ConfigError::InvalidLevels { .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\nstop_on_failure = 1.5\n",
            |err| {
                matches!(
                    err,
                    ConfigError::FractionOutOfRange {
                        field: "stop_on_failure",
                        ..
                    }
                )
            },
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\n",
            |err| matches!(err, ConfigError::NoRequests { .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"load\"\nconcurrency = 1\nduration = \"5x\"\n",
            |err| matches!(err, ConfigError::InvalidScenarioDuration { .. }),
        ),
        (
            "[[scenarios]]\nname = \"a\"\ntype = \"stress\"\nconcurrency = 8\nmax_concurrency = 4\nduration = 5\n",
            |err| matches!(err, ConfigError::MaxConcurrencyBelowConcurrency { .. }),
        ),
    ];

    for (scenario, predicate) in cases {
        let err = expect_config_error(&with_target(scenario))?;
        if !predicate(&err) {
            return Err(format!("Unexpected error for {:?}: {}", scenario, err));
        }
    }
    Ok(())
}

#[test]
fn requests_and_streams_are_exclusive() -> Result<(), String> {
    let content = with_target(
        "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\n\n[[scenarios.requests]]\npath = \"/\"\n\n[[scenarios.streams]]\nname = \"s\"\n\n[[scenarios.streams.requests]]\npath = \"/\"\n",
    );
    match expect_config_error(&content)? {
        ConfigError::RequestsAndStreams { .. } => Ok(()),
        other => Err(format!("Unexpected error: {}", other)),
    }
}

#[test]
fn duplicate_scenarios_are_rejected() -> Result<(), String> {
    let scenario = "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\n\n[[scenarios.requests]]\npath = \"/\"\n";
    let content = with_target(&format!("{}\n{}", scenario, scenario));
    match expect_config_error(&content)? {
        ConfigError::DuplicateScenario { name } if name == "a" => Ok(()),
        other => Err(format!("Unexpected error: {}", other)),
    }
}

#[test]
fn weighted_streams_are_kept() -> Result<(), String> {
    let content = with_target(
        "[[scenarios]]\nname = \"mix\"\ntype = \"smoke\"\n\n[[scenarios.streams]]\nname = \"reads\"\nweight = 3\n\n[[scenarios.streams.requests]]\npath = \"/items\"\n\n[[scenarios.streams]]\nname = \"writes\"\n\n[[scenarios.streams.requests]]\nmethod = \"put\"\npath = \"/items/1\"\n",
    );
    let config = build(&content).map_err(|err| err.to_string())?;
    let scenario = config
        .scenarios
        .first()
        .ok_or_else(|| "Missing scenario".to_owned())?;
    let shape: Vec<(&str, usize)> = scenario
        .streams
        .iter()
        .map(|stream| (stream.name.as_str(), stream.weight))
        .collect();
    if shape != [("reads", 3), ("writes", 1)] {
        return Err(format!("Unexpected streams: {:?}", shape));
    }
    Ok(())
}

#[test]
fn select_filters_by_name() -> Result<(), String> {
    let config = build(BASIC_TOML).map_err(|err| err.to_string())?;

    let picked = config
        .select(&["steady".to_owned()])
        .map_err(|err| err.to_string())?;
    if picked.len() != 1 || picked.first().map(|s| s.config.name.as_str()) != Some("steady") {
        return Err("Expected only steady".to_owned());
    }
    if config.select(&[]).map_err(|err| err.to_string())?.len() != 2 {
        return Err("Expected every scenario".to_owned());
    }
    match config.select(&["missing".to_owned()]) {
        Err(AppError::Config(ConfigError::UnknownScenarioName { name })) if name == "missing" => {
            Ok(())
        }
        Err(other) => Err(format!("Unexpected error: {}", other)),
        Ok(_) => Err("Expected unknown scenario".to_owned()),
    }
}

#[test]
fn templated_path_renders_per_request() -> Result<(), String> {
    let content = with_target(
        "[[scenarios]]\nname = \"a\"\ntype = \"smoke\"\n\n[[scenarios.requests]]\npath = \"/users/{{index}}\"\n\n[[scenarios.requests]]\npath = \"/plain\"\n",
    );
    let config = build(&content).map_err(|err| err.to_string())?;
    let requests = &config
        .scenarios
        .first()
        .and_then(|scenario| scenario.streams.first())
        .ok_or_else(|| "Missing stream".to_owned())?
        .requests;
    let cache = Arc::new(ResponseCache::new(4));

    let templated = requests
        .first()
        .ok_or_else(|| "Missing templated".to_owned())?
        .to_spec(&cache);
    if !templated.endpoint.is_empty() {
        return Err("Templated endpoint should be empty".to_owned());
    }
    match &templated.params {
        RequestParamSource::Generated(generate) => {
            let params = generate(7);
            if params.path.as_deref() != Some("/users/7") {
                return Err(format!("Unexpected path: {:?}", params.path));
            }
        }
        RequestParamSource::Static(_) => return Err("Expected generated params".to_owned()),
    }

    let plain = requests
        .get(1)
        .ok_or_else(|| "Missing plain".to_owned())?
        .to_spec(&cache);
    if plain.endpoint != "/plain" {
        return Err(format!("Unexpected endpoint: {}", plain.endpoint));
    }
    Ok(())
}

#[test]
fn parse_duration_values() -> Result<(), String> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("10s", Duration::from_secs(10)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3600)),
        ("15", Duration::from_secs(15)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_value(input).map_err(|err| err.to_string())?;
        if parsed != expected {
            return Err(format!("{} parsed to {:?}", input, parsed));
        }
    }
    for invalid in ["", "s", "0s", "5d", "-1s"] {
        if parse_duration_value(invalid).is_ok() {
            return Err(format!("Expected '{}' to fail", invalid));
        }
    }
    Ok(())
}

#[test]
fn duration_value_zero_detection() -> Result<(), String> {
    let zero = [
        DurationValue::Seconds(0),
        DurationValue::Text("0".to_owned()),
        DurationValue::Text("0s".to_owned()),
        DurationValue::Text("00ms".to_owned()),
    ];
    if let Some(value) = zero.iter().find(|value| !value.is_zero()) {
        return Err(format!("Expected zero: {:?}", value));
    }
    if DurationValue::Text("10s".to_owned()).is_zero() || DurationValue::Seconds(3).is_zero() {
        return Err("Expected non-zero".to_owned());
    }
    Ok(())
}

#[test]
fn parse_header_lines() -> Result<(), String> {
    let (key, value) = parse_header(" Authorization : Bearer a:b ").map_err(|err| err.to_string())?;
    if key != "Authorization" || value != "Bearer a:b" {
        return Err(format!("Unexpected header: {}={}", key, value));
    }
    if parse_header("novalue").is_ok() || parse_header(": empty").is_ok() {
        return Err("Expected malformed headers to fail".to_owned());
    }
    Ok(())
}

#[test]
fn parse_helpers_accept_fixture() -> Result<(), String> {
    let file = parse_toml(BASIC_TOML)?;
    if file.run.on_error.as_deref() != Some("abort") {
        return Err("Unexpected run section".to_owned());
    }
    Ok(())
}
