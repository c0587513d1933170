//! Boundary to the remote check endpoints.
//!
//! The engine never talks to the network itself. It hands a
//! [`RemoteRequest`] to a [`RemoteTransport`] and interprets the boolean it
//! gets back as "valid". Any [`TransportError`] is inconclusive and resolves
//! as a pass.

use std::fmt;
use std::future::Future;

/// One remote check: `POST <endpoint>` with body `field_name=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub endpoint: String,
    pub field_name: String,
    pub value: String,
}

impl fmt::Display for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POST {} ({}=…)", self.endpoint, self.field_name)
    }
}

/// Errors from a remote check transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or no response was read.
    #[error("Remote check request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("Remote check endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body is not boolean-coercible.
    #[error("Remote check returned an unrecognized payload: {0}")]
    Payload(String),
}

/// Transport used by the coordinator to run remote checks.
///
/// Implementations are shared across spawned check tasks, so they must be
/// `Send + Sync + 'static`.
pub trait RemoteTransport: Send + Sync + 'static {
    /// Run the check and return whether the value is valid.
    fn check(
        &self,
        request: &RemoteRequest,
    ) -> impl Future<Output = Result<bool, TransportError>> + Send;
}

/// Interpret a response body as a boolean.
///
/// Accepts `true` / `false` (case-insensitive, surrounding whitespace
/// ignored), a JSON boolean, or a JSON string holding either word.
pub fn parse_verdict(body: &str) -> Result<bool, TransportError> {
    let trimmed = body.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(false);
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Bool(b)) => Ok(b),
        Ok(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Ok(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(TransportError::Payload(trimmed.chars().take(64).collect())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
