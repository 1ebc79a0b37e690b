use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use super::cache::ResponseCache;
use super::spec::{RequestParamSource, RequestParams};

const PLACEHOLDER_OPEN: &str = "{{";

/// Raw per-request parameters as written in a config file.
#[derive(Debug, Clone, Default)]
pub struct ParamTemplate {
    pub path: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ParamTemplate {
    fn has_placeholders(&self) -> bool {
        self.path
            .as_deref()
            .is_some_and(|path| path.contains(PLACEHOLDER_OPEN))
            || self
                .query
                .iter()
                .any(|(key, value)| key.contains(PLACEHOLDER_OPEN) || value.contains(PLACEHOLDER_OPEN))
            || self.body.as_ref().is_some_and(value_has_placeholders)
    }

    /// Builds a static source unless a placeholder needs per-index rendering.
    #[must_use]
    pub fn into_source(self, cache: Arc<ResponseCache>) -> RequestParamSource {
        if !self.has_placeholders() {
            return RequestParamSource::Static(RequestParams {
                path: self.path,
                query: self.query,
                body: self.body,
            });
        }

        let template = Arc::new(self);
        RequestParamSource::Generated(Arc::new(move |index: u64| {
            let vars = build_template_vars(index, &cache);
            RequestParams {
                path: template
                    .path
                    .as_deref()
                    .map(|path| render_template(path, &vars)),
                query: template
                    .query
                    .iter()
                    .map(|(key, value)| (render_template(key, &vars), render_template(value, &vars)))
                    .collect(),
                body: template.body.as_ref().map(|body| render_value(body, &vars)),
            }
        }))
    }
}

fn value_has_placeholders(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(text) => text.contains(PLACEHOLDER_OPEN),
        serde_json::Value::Array(items) => items.iter().any(value_has_placeholders),
        serde_json::Value::Object(map) => map.values().any(value_has_placeholders),
        serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
            false
        }
    }
}

fn build_template_vars(index: u64, cache: &ResponseCache) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis());
    vars.insert("index".to_owned(), index.to_string());
    vars.insert("timestamp_ms".to_owned(), now_ms.to_string());
    vars.insert(
        "rand".to_owned(),
        rand::thread_rng().gen_range(0..u32::MAX).to_string(),
    );
    if let Some(cached) = cache.get(index) {
        vars.insert("cached".to_owned(), cached);
    }
    vars
}

fn render_value(value: &serde_json::Value, vars: &BTreeMap<String, String>) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => serde_json::Value::String(render_template(text, vars)),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|item| render_value(item, vars)).collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), render_value(item, vars)))
                .collect(),
        ),
        serde_json::Value::Null | serde_json::Value::Bool(_) | serde_json::Value::Number(_) => {
            value.clone()
        }
    }
}

/// Replaces `{{key}}` occurrences; unknown keys are left in place.
pub(crate) fn render_template(input: &str, vars: &BTreeMap<String, String>) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let start = match rest.find(PLACEHOLDER_OPEN) {
            Some(start) => start,
            None => {
                output.push_str(rest);
                break;
            }
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let after = match after_start.strip_prefix(PLACEHOLDER_OPEN) {
            Some(after) => after,
            None => {
                output.push_str(after_start);
                break;
            }
        };
        let end = match after.find("}}") {
            Some(end) => end,
            None => {
                output.push_str(PLACEHOLDER_OPEN);
                output.push_str(after);
                break;
            }
        };
        let (key_part, after_end) = after.split_at(end);
        let key = key_part.trim();
        if let Some(value) = vars.get(key) {
            output.push_str(value);
        } else {
            output.push_str(PLACEHOLDER_OPEN);
            output.push_str(key);
            output.push_str("}}");
        }
        rest = match after_end.strip_prefix("}}") {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}
