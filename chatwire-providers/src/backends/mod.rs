//! Concrete backends and the closed [`Backend`] enum over them.

mod archive;
mod chat_completions;
mod hub;
mod messages;
mod threads;

pub use archive::ArchiveProvider;
pub use chat_completions::ChatCompletionsProvider;
pub use hub::HubProvider;
pub use messages::MessagesProvider;
pub use threads::ThreadsProvider;

use crate::config::ProviderConfig;
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::Endpoint;
use async_trait::async_trait;
use chatwire_core::{Conversation, ConversationSummary, GatewayResult, ModelInfo, SendRequest};
use chatwire_streaming::ChatStream;
use reqwest::Client;

/// Any configured backend.
#[derive(Debug, Clone)]
pub enum Backend {
    /// OpenAI, OpenRouter, DeepSeek or Groq.
    ChatCompletions(ChatCompletionsProvider),
    /// Message-content SSE backend.
    Messages(MessagesProvider),
    /// Two-phase threads backend.
    Threads(ThreadsProvider),
    /// NDJSON chat hub.
    Hub(HubProvider),
    /// Read-only archive.
    Archive(ArchiveProvider),
}

impl Backend {
    /// Build the backend for `id`.
    pub fn from_config(
        id: ProviderId,
        config: &ProviderConfig,
        queue: RequestQueue,
    ) -> Result<Self, ProviderError> {
        Ok(match id {
            ProviderId::OpenAi | ProviderId::OpenRouter | ProviderId::DeepSeek | ProviderId::Groq => {
                Backend::ChatCompletions(ChatCompletionsProvider::from_config(id, config, queue)?)
            }
            ProviderId::Messages => Backend::Messages(MessagesProvider::from_config(config, queue)?),
            ProviderId::Threads => Backend::Threads(ThreadsProvider::from_config(config, queue)?),
            ProviderId::Hub => Backend::Hub(HubProvider::from_config(config, queue)?),
            ProviderId::Archive => Backend::Archive(ArchiveProvider::from_config(config, queue)?),
        })
    }

    /// Connection settings of the wrapped backend.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Backend::ChatCompletions(p) => p.endpoint(),
            Backend::Messages(p) => p.endpoint(),
            Backend::Threads(p) => p.endpoint(),
            Backend::Hub(p) => p.endpoint(),
            Backend::Archive(p) => p.endpoint(),
        }
    }

    /// Queue this backend dispatches through.
    #[must_use]
    pub fn queue(&self) -> &RequestQueue {
        self.endpoint().queue()
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Backend::ChatCompletions(p) => p,
            Backend::Messages(p) => p,
            Backend::Threads(p) => p,
            Backend::Hub(p) => p,
            Backend::Archive(p) => p,
        }
    }
}

#[async_trait]
impl Provider for Backend {
    fn id(&self) -> ProviderId {
        self.inner().id()
    }

    fn base_url(&self) -> &str {
        self.inner().base_url()
    }

    fn client(&self) -> &Client {
        self.inner().client()
    }

    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream> {
        self.inner().send_message(request)
    }

    async fn list_models(&self, credential: &str) -> Vec<ModelInfo> {
        self.inner().list_models(credential).await
    }

    async fn list_conversations(
        &self,
        credential: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ConversationSummary>> {
        self.inner().list_conversations(credential, limit).await
    }

    async fn get_conversation(&self, credential: &str, id: &str) -> GatewayResult<Conversation> {
        self.inner().get_conversation(credential, id).await
    }

    fn is_model_supported(&self, model: &str) -> bool {
        self.inner().is_model_supported(model)
    }
}
