//! Provider trait and construction errors.
//!
//! A provider is one chat backend: its authentication scheme, request payload
//! and wire dialect, behind a contract that is identical for every backend.

use crate::registry::ProviderId;
use async_trait::async_trait;
use chatwire_core::{
    Conversation, ConversationSummary, GatewayError, GatewayResult, ModelInfo, SendRequest,
};
use chatwire_streaming::ChatStream;
use reqwest::Client;

/// A chat backend.
///
/// Providers handle:
/// - Building the backend's request payload
/// - Resolving and attaching credentials
/// - Dispatching through the provider's request queue
/// - Normalizing the response stream into canonical events
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Backend identifier.
    fn id(&self) -> ProviderId;

    /// Provider name (e.g., "openai", "hub").
    fn name(&self) -> &'static str {
        self.id().as_str()
    }

    /// Base URL for the API.
    fn base_url(&self) -> &str;

    /// HTTP client configured for this provider.
    fn client(&self) -> &Client;

    /// Start streaming a reply.
    ///
    /// Fails synchronously only for invalid requests and unsupported
    /// operations. Every network outcome arrives as the terminal event of the
    /// returned stream. Must be called within a tokio runtime.
    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream>;

    /// Models this backend exposes. Falls back to a static list on failure.
    async fn list_models(&self, credential: &str) -> Vec<ModelInfo>;

    /// Conversations stored by the backend, newest first.
    async fn list_conversations(
        &self,
        _credential: &str,
        _limit: usize,
    ) -> GatewayResult<Vec<ConversationSummary>> {
        Err(GatewayError::unsupported(self.name(), "list_conversations"))
    }

    /// A single stored conversation.
    async fn get_conversation(&self, _credential: &str, _id: &str) -> GatewayResult<Conversation> {
        Err(GatewayError::unsupported(self.name(), "get_conversation"))
    }

    /// Whether `model` can be requested from this backend.
    fn is_model_supported(&self, _model: &str) -> bool {
        true
    }
}

/// Provider error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Missing required configuration.
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// A setting is present but has an unusable value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Base URL does not parse.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Unknown provider.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Invalid model string format.
    #[error("Invalid model string: {0}")]
    InvalidModelString(String),

    /// Provider known but not registered.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        GatewayError::Configuration(err.to_string())
    }
}
