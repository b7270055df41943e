//! Typed failures for provider calls and engine resolution.

use reqwest::StatusCode;
use thiserror::Error;

use crate::model::QueryKind;

/// Failure of a single provider call, classified so the engine can log and
/// report each mode distinctly. Every variant is handled the same way
/// during fallback: the engine moves on to the next provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Timeout, connection failure or an error status from the provider.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// The provider reported a quota or rate-limit condition (HTTP 429).
    #[error("quota exceeded: {message}")]
    Quota { message: String },

    /// The response body violated the expected contract (bad JSON,
    /// missing required fields).
    #[error("malformed response: {message}")]
    Malformed { message: String },
}

impl ProviderError {
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient { message: message.into() }
    }

    pub fn quota<S: Into<String>>(message: S) -> Self {
        Self::Quota { message: message.into() }
    }

    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::Malformed { message: message.into() }
    }

    /// Classify a non-success HTTP status: 429 is a quota signal, anything
    /// else is treated as a transient provider failure.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::quota(truncate_body(body))
        } else {
            Self::transient(format!("HTTP {status}: {}", truncate_body(body)))
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::malformed(err.to_string())
        } else if err.is_timeout() {
            Self::transient(format!("request timed out: {err}"))
        } else {
            Self::transient(err.to_string())
        }
    }
}

/// The only error that crosses the engine boundary: raised when every
/// configured provider failed to produce a result. Carries the first
/// underlying provider error for diagnostics; `None` when no capable
/// provider was even attempted.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("all weather providers failed for {kind} query")]
    AllProvidersFailed {
        kind: QueryKind,
        #[source]
        first: Option<ProviderError>,
    },
}

impl ResolveError {
    pub fn all_failed(kind: QueryKind, first: Option<ProviderError>) -> Self {
        Self::AllProvidersFailed { kind, first }
    }
}

/// Cap response bodies quoted in error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}
