//! Conversation messages and the send request.

use crate::errors::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user.
    User,
    /// Model output.
    Assistant,
    /// System instructions.
    System,
}

impl Role {
    /// Wire name used by every backend.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "model" | "bot" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(GatewayError::invalid_request(format!("unknown role: {other}"))),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A request to stream one assistant reply.
///
/// The credential is opaque: it may be a raw API key, a session token that
/// needs exchanging, or a cookie string, depending on the backend.
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Credential for the backend.
    pub credential: String,
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Model identifier; backends fall back to their default model.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Ask the backend for reasoning output.
    pub thinking: bool,
    /// Existing conversation to append to.
    pub conversation_id: Option<String>,
    /// Upper bound on the whole call, queue wait included.
    pub deadline: Option<Duration>,
    /// Caller-side cancellation.
    pub cancel: Option<CancellationToken>,
}

impl SendRequest {
    /// Create a request with a credential and messages.
    pub fn new(credential: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            credential: credential.into(),
            messages,
            model: None,
            temperature: None,
            thinking: false,
            conversation_id: None,
            deadline: None,
            cancel: None,
        }
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Enable or disable reasoning output.
    #[must_use]
    pub fn with_thinking(mut self, thinking: bool) -> Self {
        self.thinking = thinking;
        self
    }

    /// Continue an existing conversation.
    #[must_use]
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Set a deadline for the whole call.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Check the request before dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] when `messages` is empty.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.messages.is_empty() {
            return Err(GatewayError::invalid_request("messages must not be empty"));
        }
        Ok(())
    }

    /// The most recent user message, if any.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}
