//! HTTP transport for remote validation checks.
//!
//! Sends `POST <endpoint>` with a form-encoded `field_name=value` body and
//! reads the response as a boolean verdict using [`reqwest`]. Endpoints may
//! be absolute URLs or paths joined onto a configured base URL.

use std::time::Duration;

use formguard_core::transport::parse_verdict;
use formguard_core::{RemoteRequest, RemoteTransport, TransportError};

/// Default per-request timeout, independent of the engine's fail-open
/// timeout.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Base URL that relative endpoints are joined onto, e.g.
    /// `http://localhost:4567`.
    pub base_url: Option<String>,
    /// Per-request timeout (default: `30` seconds).
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl HttpTransportConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `FORMGUARD_REMOTE_BASE_URL`   | unset   |
    /// | `FORMGUARD_HTTP_TIMEOUT_SECS` | `30`    |
    pub fn from_env() -> Self {
        let base_url = std::env::var("FORMGUARD_REMOTE_BASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let timeout_secs = std::env::var("FORMGUARD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Errors from the HTTP layer, before they are folded into
/// [`TransportError`].
#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("Remote check endpoint error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<HttpTransportError> for TransportError {
    fn from(err: HttpTransportError) -> Self {
        match err {
            HttpTransportError::Request(e) => TransportError::Request(e.to_string()),
            HttpTransportError::Status { status, body } => TransportError::Status { status, body },
        }
    }
}

/// [`RemoteTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self, HttpTransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    /// Create a transport reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    /// Resolve an endpoint identifier to a URL.
    ///
    /// Absolute `http(s)://` endpoints are used as-is; anything else is
    /// joined onto the base URL when one is configured.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }

    /// Ensure the response has a success status code, capturing the body
    /// on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, HttpTransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(HttpTransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl RemoteTransport for HttpTransport {
    async fn check(&self, request: &RemoteRequest) -> Result<bool, TransportError> {
        let url = self.endpoint_url(&request.endpoint);
        tracing::debug!(url = %url, field = %request.field_name, "Posting remote check");

        let response = self
            .client
            .post(&url)
            .form(&[(request.field_name.as_str(), request.value.as_str())])
            .send()
            .await
            .map_err(HttpTransportError::from)?;

        let response = Self::ensure_success(response).await?;
        let body = response.text().await.map_err(HttpTransportError::from)?;
        parse_verdict(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
