use std::time::Duration;

use reqwest::{
    Client, Url,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tracing::debug;

use crate::error::{AppError, AppResult, HttpError};

pub(crate) const DEFAULT_USER_AGENT: &str =
    concat!("stressgate-loadtest/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The resolved system under test: one shared client plus its base URL.
///
/// The client is read-shared by every in-flight request of a batch and never
/// reconfigured while a batch runs.
#[derive(Debug, Clone)]
pub struct Target {
    client: Client,
    base_url: Url,
}

impl Target {
    /// Parses the base URL, resolves its host, and builds the shared client.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid, the host does not resolve,
    /// a default header is malformed, or the client cannot be built.
    pub async fn resolve(base_url: &str, headers: &[(String, String)]) -> AppResult<Self> {
        let url = parse_base_url(base_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| {
                AppError::http(HttpError::UrlMissingHost {
                    url: base_url.to_owned(),
                })
            })?
            .to_owned();
        let port = url.port_or_known_default().unwrap_or(80);

        let addrs: Vec<_> = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|err| {
                AppError::http(HttpError::ResolveHost {
                    host: host.clone(),
                    port,
                    source: err,
                })
            })?
            .collect();
        if addrs.is_empty() {
            return Err(AppError::http(HttpError::NoAddressesResolved { host }));
        }
        debug!("Resolved {} to {:?}", host, addrs);

        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .default_headers(build_headers(headers)?)
            .build()
            .map_err(|err| AppError::http(HttpError::BuildClientFailed { source: err }))?;

        Ok(Self {
            client,
            base_url: url,
        })
    }

    /// Wraps an existing client without performing DNS resolution.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL is invalid.
    pub fn from_client(client: Client, base_url: &str) -> AppResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins an endpoint path onto the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url.join(path).map_err(|err| {
            AppError::http(HttpError::JoinUrlFailed {
                path: path.to_owned(),
                source: err,
            })
        })
    }
}

fn parse_base_url(base_url: &str) -> AppResult<Url> {
    let mut url = Url::parse(base_url).map_err(|err| {
        AppError::http(HttpError::InvalidUrl {
            url: base_url.to_owned(),
            source: err,
        })
    })?;
    if url.host_str().is_none() {
        return Err(AppError::http(HttpError::UrlMissingHost {
            url: base_url.to_owned(),
        }));
    }
    // Relative endpoints must join under the base path, not replace its last segment.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub(super) fn build_headers(headers: &[(String, String)]) -> AppResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
            AppError::http(HttpError::InvalidHeader {
                name: key.clone(),
                message: err.to_string(),
            })
        })?;
        let val = HeaderValue::from_str(value).map_err(|err| {
            AppError::http(HttpError::InvalidHeader {
                name: key.clone(),
                message: err.to_string(),
            })
        })?;
        map.insert(name, val);
    }
    Ok(map)
}
