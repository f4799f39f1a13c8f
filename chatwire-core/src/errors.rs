//! Error types for chatwire.
//!
//! Every failure a caller can observe on a chat stream is a [`GatewayError`].
//! Errors are `Clone` so they can travel inside [`ChatEvent::Error`](crate::ChatEvent).

use std::time::Duration;
use thiserror::Error;

/// The main error type for gateway operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Connection failure, DNS error, reset while reading the body.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the upstream backend.
    #[error("Upstream error: {status} - {body}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the backend.
        body: String,
    },

    /// The backend reported an error inside an otherwise healthy stream.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A 2xx response arrived without a readable body.
    #[error("Upstream response has no body")]
    MissingBody,

    /// The backend does not implement this capability.
    #[error("{provider} does not support {operation}")]
    Unsupported {
        /// Provider identifier.
        provider: String,
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The request failed validation before anything was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The request deadline elapsed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response stream could not be framed.
    #[error("Stream error: {0}")]
    Stream(String),

    /// The request queue dropped the task.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an upstream error from a status code and body.
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create an in-stream backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(provider: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            operation,
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status code, for upstream errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error was raised because the caller gave up on the request.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }
}

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
