//! Error types for the shared API client.
//!
//! # Design
//! - Keep display messages constant and carry context in fields.
//! - `Status` keeps the buffered response so callers can inspect the body.
//! - `Transport` is the only variant whose message is rewritten by the status policy.

use std::path::PathBuf;

use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use thiserror::Error;

use crate::message::ApiResponse;

/// Result alias for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result alias for settings resolution.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced by [`crate::ApiClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a status outside `200..=299`.
    #[error("request failed with status {status}")]
    Status {
        /// Status code reported by the backend.
        status: StatusCode,
        /// Buffered response that carried the status.
        response: Box<ApiResponse>,
    },
    /// No response was received (connection refused, DNS, timeout, reset).
    #[error("{message}")]
    Transport {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying transport error.
        source: reqwest::Error,
    },
    /// The shared cancellation source fired before the exchange completed.
    #[error("request cancelled")]
    Cancelled,
    /// A header value could not be encoded.
    #[error("invalid header value")]
    InvalidHeader {
        /// Header the value was destined for.
        name: &'static str,
        /// Underlying header error.
        source: InvalidHeaderValue,
    },
    /// A request path could not be resolved against the base URL.
    #[error("invalid request path")]
    InvalidPath {
        /// Path supplied by the caller.
        path: String,
        /// Underlying URL error.
        source: url::ParseError,
    },
    /// The HTTP transport could not be constructed.
    #[error("failed to build HTTP client")]
    ClientBuild {
        /// Underlying builder error.
        source: reqwest::Error,
    },
    /// A request body could not be serialised.
    #[error("failed to encode request body")]
    Encode {
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// A response body could not be deserialised.
    #[error("failed to decode response body")]
    Decode {
        /// Status of the response that failed to decode.
        status: StatusCode,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

impl ApiError {
    pub(crate) fn transport(source: reqwest::Error) -> Self {
        Self::Transport {
            message: source.to_string(),
            source,
        }
    }

    pub(crate) fn status(response: ApiResponse) -> Self {
        Self::Status {
            status: response.status(),
            response: Box::new(response),
        }
    }

    /// Status code of the response attached to this error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Buffered response attached to this error, if any.
    #[must_use]
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Self::Status { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Whether the request was aborted by the shared cancellation source.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the failure happened before any response was received.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Replace the message of a transport failure; other variants are returned unchanged.
    #[must_use]
    pub fn with_transport_message(self, message: impl Into<String>) -> Self {
        match self {
            Self::Transport { source, .. } => Self::Transport {
                message: message.into(),
                source,
            },
            other => other,
        }
    }
}

/// Errors raised while resolving [`crate::ClientSettings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The base URL could not be parsed.
    #[error("invalid base URL")]
    InvalidBaseUrl {
        /// Raw value supplied by the environment or host.
        value: String,
        /// Underlying URL error.
        source: url::ParseError,
    },
    /// The base URL used a scheme other than `http` or `https`.
    #[error("unsupported base URL scheme")]
    UnsupportedScheme {
        /// Scheme found in the base URL.
        scheme: String,
    },
    /// The request timeout was not a whole number of seconds.
    #[error("invalid request timeout")]
    InvalidTimeout {
        /// Raw value supplied by the environment.
        value: String,
        /// Underlying parse error.
        source: std::num::ParseIntError,
    },
    /// The request timeout was zero, which would fail every request.
    #[error("request timeout must be at least one second")]
    ZeroTimeout,
    /// The host globals document could not be read.
    #[error("failed to read host globals")]
    GlobalsRead {
        /// Path of the globals document.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The host globals document was not valid JSON.
    #[error("failed to parse host globals")]
    GlobalsParse {
        /// Path of the globals document, when loaded from disk.
        path: Option<PathBuf>,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}
