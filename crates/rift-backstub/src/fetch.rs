//! Upstream calls.
//!
//! The fetcher mirrors the inbound verb, path, query and body onto the
//! service host and reads the whole response. A body that isn't JSON is not
//! an error: it yields `Value::Null` and a warning.

use crate::config::ClientConfig;
use crate::error::{FetchError, MountError};
use crate::headers::{copy_forwardable, VALUE_IDENTITY, VALUE_JSON};
use crate::request::RequestContext;
use bytes::Bytes;
use hyper::header::{HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use hyper::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_USER_AGENT: &str = concat!("rift-backstub/", env!("CARGO_PKG_VERSION"));

/// The upstream response as seen by computed leaves and the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed upstream body (`Null` when empty or not JSON).
    pub body: Value,
    /// Body bytes as received.
    pub raw_body: Bytes,
}

/// A validated upstream service base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    url: Url,
}

impl Service {
    pub fn parse(raw: &str) -> Result<Self, MountError> {
        let invalid = |reason: &str| MountError::InvalidService {
            url: raw.to_string(),
            reason: reason.to_string(),
        };
        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The upstream URL for an inbound `path?query`. Only the service's
    /// scheme, host and port are used.
    pub fn target_url(&self, request_url: &str) -> Result<Url, FetchError> {
        let host = self.url.host_str().unwrap_or_default();
        let authority = match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = if request_url.starts_with('/') {
            request_url.to_string()
        } else {
            format!("/{request_url}")
        };
        let target = format!("{}://{}{}", self.url.scheme(), authority, path);
        Url::parse(&target).map_err(|e| FetchError::InvalidUrl {
            url: target,
            reason: e.to_string(),
        })
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Shared upstream client.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        if config.tls_skip_verify {
            warn!(
                "TLS certificate verification DISABLED for upstream services (development/testing only)"
            );
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .danger_accept_invalid_certs(config.tls_skip_verify)
            .redirect(Policy::none())
            .build()
            .map_err(FetchError::Client)?;

        info!(
            "Upstream client configured: connect_timeout={}s, request_timeout={}s, max_idle={}",
            config.connect_timeout_secs, config.request_timeout_secs, config.pool_max_idle_per_host
        );

        Ok(Self { client })
    }

    /// Forward `request` to `service` and parse the response body as JSON.
    pub async fn fetch(
        &self,
        request: &RequestContext,
        service: &Service,
    ) -> Result<(Value, ResponseMeta), FetchError> {
        let target = service.target_url(&request.url)?;
        let url = target.to_string();

        let mut headers = HeaderMap::new();
        copy_forwardable(&request.headers, &mut headers);
        headers.insert(ACCEPT, VALUE_JSON.clone());
        headers.insert(ACCEPT_ENCODING, VALUE_IDENTITY.clone());
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }

        let mut outbound = self.client.request(request.method.clone(), target);
        if let Some(body) = request.json_body() {
            let bytes = serde_json::to_vec(body).unwrap_or_default();
            headers.insert(CONTENT_TYPE, VALUE_JSON.clone());
            outbound = outbound.body(bytes);
        } else if !request.raw_body.is_empty() {
            outbound = outbound.body(request.raw_body.clone());
        }

        debug!(method = %request.method, upstream = %url, "Forwarding request upstream");

        let response = outbound
            .headers(headers)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Body {
                url: url.clone(),
                source,
            })?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        method = %request.method,
                        path = %request.url,
                        error = %e,
                        "Could not parse JSON body"
                    );
                    Value::Null
                }
            }
        };

        debug!(upstream = %url, status, bytes = bytes.len(), "Upstream responded");

        let meta = ResponseMeta {
            status,
            headers: response_headers,
            body: body.clone(),
            raw_body: bytes,
        };
        Ok((body, meta))
    }
}
