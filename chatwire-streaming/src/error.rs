//! Streaming errors.

use chatwire_core::GatewayError;
use thiserror::Error;

/// Errors that can occur while framing a response body.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A single line grew past the framer's buffer limit.
    #[error("Line buffer exceeded {0} bytes")]
    BufferOverflow(usize),

    /// The underlying transport failed mid-stream.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StreamError {
    /// Create from any transport error.
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<StreamError> for GatewayError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Transport(message) => GatewayError::Transport(message),
            other => GatewayError::Stream(other.to_string()),
        }
    }
}

/// Result type for streaming operations.
pub type StreamResult<T> = Result<T, StreamError>;
