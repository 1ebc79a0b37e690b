use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Request, Url};
use tokio::time::Instant;
use tracing::debug;

use crate::metrics::RequestResult;

use super::cache::ResponseCache;
use super::spec::{RequestParams, RequestSpec};
use super::target::build_headers;

/// A spec whose static endpoint has already been joined onto the target.
#[derive(Debug, Clone)]
pub(super) struct PreparedRequest {
    pub(super) spec: std::sync::Arc<RequestSpec>,
    pub(super) url: Url,
}

/// Builds the concrete request for one batch index.
pub(super) fn build_request(
    client: &Client,
    prepared: &PreparedRequest,
    params: RequestParams,
) -> Result<Request, String> {
    let url = match params.path.as_deref() {
        Some(path) => prepared
            .url
            .join(path)
            .map_err(|err| format!("invalid path '{}': {}", path, err))?,
        None => prepared.url.clone(),
    };
    let headers = build_headers(&prepared.spec.headers).map_err(|err| err.to_string())?;
    let mut builder = client
        .request(prepared.spec.method.as_reqwest(), url)
        .headers(headers);
    if !params.query.is_empty() {
        builder = builder.query(&params.query);
    }
    if let Some(body) = params.body.as_ref() {
        builder = builder.json(body);
    }
    builder.build().map_err(|err| format!("failed to build request: {}", err))
}

/// Sends one request and converts every outcome into a `RequestResult`.
pub(super) async fn execute_timed(
    client: &Client,
    request: Request,
    spec: &RequestSpec,
    request_timeout: Duration,
    cache: &ResponseCache,
    start: Instant,
) -> RequestResult {
    match tokio::time::timeout(request_timeout, execute_request(client, request, spec, cache)).await
    {
        Ok(Ok(status)) => {
            let latency = start.elapsed();
            if spec.accepts(status) {
                RequestResult::success(status, latency)
            } else {
                RequestResult::rejected(status, latency, format!("unexpected status {}", status))
            }
        }
        Ok(Err(failure)) => {
            let latency = start.elapsed();
            debug!("Request to {} failed: {}", spec.endpoint, failure.message);
            match failure.status {
                Some(status) => RequestResult::rejected(status, latency, failure.message),
                None => RequestResult::transport_failure(Some(latency), failure.message),
            }
        }
        Err(_elapsed) => RequestResult::transport_failure(
            Some(start.elapsed()),
            format!("timed out after {}ms", request_timeout.as_millis()),
        ),
    }
}

struct RequestFailure {
    status: Option<u16>,
    message: String,
}

async fn execute_request(
    client: &Client,
    request: Request,
    spec: &RequestSpec,
    cache: &ResponseCache,
) -> Result<u16, RequestFailure> {
    let response = client.execute(request).await.map_err(|err| RequestFailure {
        status: None,
        message: classify_transport_error(&err),
    })?;
    let status = response.status().as_u16();

    match spec.capture.as_deref() {
        Some(field) if spec.accepts(status) => {
            let bytes = response.bytes().await.map_err(|err| RequestFailure {
                status: Some(status),
                message: format!("failed to read response body: {}", err),
            })?;
            if let Some(value) = capture_field(&bytes, field) {
                cache.push(value);
            }
        }
        Some(_) | None => {
            drain_response_body(response)
                .await
                .map_err(|err| RequestFailure {
                    status: Some(status),
                    message: format!("failed to read response body: {}", err),
                })?;
        }
    }

    Ok(status)
}

fn classify_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {}", err)
    } else if err.is_connect() {
        format!("connection error: {}", err)
    } else {
        format!("request error: {}", err)
    }
}

/// Reads a top-level field from a JSON body as a plain string.
pub(super) fn capture_field(body: &[u8], field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get(field)? {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            None
        }
    }
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}
