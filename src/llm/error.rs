//! LLM error types

use thiserror::Error;

/// Adapter error with classification
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::TransportUnavailable, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Http(status), message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Decode, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Backend unreachable, misconfigured, or timed out
    TransportUnavailable,
    /// Non-2xx status not covered by a more specific kind
    Http(u16),
    /// Missing credential, 401 or 403
    Auth,
    /// 429
    RateLimit,
    /// 5xx
    ServerError,
    /// Response body could not be decoded
    Decode,
}

impl LlmErrorKind {
    /// Short label used in structured logs
    pub fn label(self) -> &'static str {
        match self {
            Self::TransportUnavailable => "transport_unavailable",
            Self::Http(_) => "http_error",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Decode => "decode",
        }
    }

    /// Classify a non-2xx status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimit,
            500..=599 => Self::ServerError,
            other => Self::Http(other),
        }
    }
}
