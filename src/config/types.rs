use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ValidationError;
use crate::http::HttpMethod;
use crate::metrics::ThresholdConfig;

/// On-disk layout of a `stressgate.toml` / `stressgate.json` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub target: Option<TargetSection>,
    pub service: Option<ServiceSection>,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Option<DurationValue>,
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    /// Program to launch; omit when the service is started elsewhere.
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    pub health_path: Option<String>,
    pub health_retries: Option<u32>,
    pub health_backoff: Option<DurationValue>,
    pub health_timeout: Option<DurationValue>,
    pub stop_timeout: Option<DurationValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub on_error: Option<String>,
    pub output_dir: Option<String>,
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub concurrency: Option<usize>,
    pub spawn_rate: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub duration: Option<DurationValue>,
    pub warm_up_time: Option<DurationValue>,
    /// Success-rate floor (fraction).
    pub stop_on_failure: Option<f64>,
    pub levels: Option<Vec<usize>>,
    pub requests_per_level: Option<usize>,
    pub batch_multiplier: Option<usize>,
    pub checkpoint_interval: Option<usize>,
    /// Overrides `[target].timeout` for this scenario.
    pub timeout: Option<DurationValue>,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub requests: Vec<RequestSection>,
    #[serde(default)]
    pub streams: Vec<StreamSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    pub name: String,
    pub weight: Option<usize>,
    #[serde(default)]
    pub requests: Vec<RequestSection>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    pub name: Option<String>,
    pub method: Option<HttpMethod>,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub expect_status: Vec<u16>,
    pub capture: Option<String>,
}

/// Either whole seconds or a `<N><ms|s|m|h>` string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => super::parse_duration_value(text),
        }
    }

    /// Zero means "disabled" for optional phases such as warm-up.
    pub(crate) fn is_zero(&self) -> bool {
        match self {
            DurationValue::Seconds(secs) => *secs == 0,
            DurationValue::Text(text) => {
                let trimmed = text.trim();
                trimmed.starts_with('0')
                    && !trimmed
                        .trim_start_matches('0')
                        .starts_with(|ch: char| ch.is_ascii_digit())
            }
        }
    }
}
