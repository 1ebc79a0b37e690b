use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    #[must_use]
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }
}

/// Per-request values that may differ between indices of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    /// Overrides the spec endpoint for this request when set.
    pub path: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

pub type ParamGenerator = Arc<dyn Fn(u64) -> RequestParams + Send + Sync>;

/// Where a request's query/body come from.
#[derive(Clone)]
pub enum RequestParamSource {
    Static(RequestParams),
    Generated(ParamGenerator),
}

impl RequestParamSource {
    #[must_use]
    pub fn resolve(&self, index: u64) -> RequestParams {
        match self {
            RequestParamSource::Static(params) => params.clone(),
            RequestParamSource::Generated(generator) => generator(index),
        }
    }

    #[must_use]
    pub const fn is_generated(&self) -> bool {
        matches!(self, RequestParamSource::Generated(_))
    }
}

impl Default for RequestParamSource {
    fn default() -> Self {
        RequestParamSource::Static(RequestParams::default())
    }
}

impl fmt::Debug for RequestParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestParamSource::Static(params) => f.debug_tuple("Static").field(params).finish(),
            RequestParamSource::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub name: Option<String>,
    pub method: HttpMethod,
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub params: RequestParamSource,
    /// Accepted status codes; empty means any 2xx.
    pub expect_status: Vec<u16>,
    /// Top-level JSON field whose value is pushed into the response cache.
    pub capture: Option<String>,
}

impl RequestSpec {
    #[must_use]
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            name: None,
            method,
            endpoint: endpoint.into(),
            headers: Vec::new(),
            params: RequestParamSource::default(),
            expect_status: Vec::new(),
            capture: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: RequestParamSource) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_capture(mut self, field: impl Into<String>) -> Self {
        self.capture = Some(field.into());
        self
    }

    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        if self.expect_status.is_empty() {
            return (200..300).contains(&status);
        }
        self.expect_status.contains(&status)
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:?} {}", self.method, self.endpoint))
    }
}

/// Request mix for one stream. Request `i` of a batch uses spec `i % len`.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    specs: Vec<Arc<RequestSpec>>,
}

impl Workload {
    #[must_use]
    pub fn new(specs: Vec<RequestSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(Arc::new).collect(),
        }
    }

    #[must_use]
    pub fn single(spec: RequestSpec) -> Self {
        Self::new(vec![spec])
    }

    #[must_use]
    pub fn specs(&self) -> &[Arc<RequestSpec>] {
        &self.specs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
