//! GitHub API error types.
//!
//! Errors are split into transient failures, which may succeed if the handler
//! is re-run (5xx, rate limits, network trouble), and permanent ones (most
//! 4xx responses, malformed responses).

use std::fmt;
use thiserror::Error;

/// Whether retrying the same call might succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// HTTP 5xx, HTTP 429, rate-limited 403s, network failures.
    Transient,
    /// Everything else.
    Permanent,
}

impl ClientErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, ClientErrorKind::Transient)
    }
}

/// A failed GitHub API call.
#[derive(Debug, Error)]
pub struct ClientError {
    pub kind: ClientErrorKind,

    /// The HTTP status code, if the API answered.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl ClientError {
    /// Classifies an octocrab error.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = match &err {
            octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
            _ => None,
        };
        let message = err.to_string();
        ClientError {
            kind: classify(status_code, &message),
            status_code,
            message,
            source: Some(err),
        }
    }

    /// The API answered with a status the caller treats as a failure.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        ClientError {
            kind: classify(Some(status_code), &message),
            status_code: Some(status_code),
            message,
            source: None,
        }
    }

    /// The client could not be set up from the given credentials.
    pub fn configuration(message: impl Into<String>) -> Self {
        ClientError {
            kind: ClientErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// The API answered with something the caller could not use.
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        ClientError {
            kind: ClientErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }
}

fn classify(status_code: Option<u16>, message: &str) -> ClientErrorKind {
    match status_code {
        Some(429) => ClientErrorKind::Transient,
        Some(403) if is_rate_limit_error(message) => ClientErrorKind::Transient,
        Some(code) if (500..600).contains(&code) => ClientErrorKind::Transient,
        Some(_) => ClientErrorKind::Permanent,
        None if is_network_error(message) => ClientErrorKind::Transient,
        None => ClientErrorKind::Permanent,
    }
}

fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("timed out")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
}
