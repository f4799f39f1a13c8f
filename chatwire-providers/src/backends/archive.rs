//! Read-only conversation archive.
//!
//! The archive renders past conversations as an HTML page and accepts no new
//! messages. Only history listing is available.

use crate::config::ProviderConfig;
use crate::history::{default_anchor_pattern, fetch_text, scrape_conversations};
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::{cookie_header, Endpoint};
use async_trait::async_trait;
use chatwire_core::{ConversationSummary, GatewayError, GatewayResult, ModelInfo, SendRequest};
use chatwire_streaming::ChatStream;
use regex::Regex;
use reqwest::Client;

const SESSION_COOKIE: &str = "session";

/// History-only backend.
#[derive(Debug, Clone)]
pub struct ArchiveProvider {
    endpoint: Endpoint,
    history_pattern: Option<Regex>,
}

impl ArchiveProvider {
    /// Create from configuration. `base_url` is required.
    pub fn from_config(config: &ProviderConfig, queue: RequestQueue) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::from_config(ProviderId::Archive, config, queue)?,
            history_pattern: None,
        })
    }

    /// Connection settings.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Override the pattern used to scrape the history page.
    #[must_use]
    pub fn with_history_pattern(mut self, pattern: Regex) -> Self {
        self.history_pattern = Some(pattern);
        self
    }
}

#[async_trait]
impl Provider for ArchiveProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Archive
    }

    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn client(&self) -> &Client {
        self.endpoint.client()
    }

    fn send_message(&self, _request: SendRequest) -> GatewayResult<ChatStream> {
        Err(GatewayError::unsupported(self.name(), "send_message"))
    }

    async fn list_models(&self, _credential: &str) -> Vec<ModelInfo> {
        Vec::new()
    }

    async fn list_conversations(
        &self,
        credential: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ConversationSummary>> {
        let request = self
            .endpoint
            .client()
            .get(self.endpoint.url("/history"))
            .header("Cookie", cookie_header(self.endpoint.credential(credential), SESSION_COOKIE));
        let html = fetch_text(request).await?;
        let pattern = self
            .history_pattern
            .as_ref()
            .unwrap_or_else(|| default_anchor_pattern());
        Ok(scrape_conversations(&html, pattern, limit))
    }

    fn is_model_supported(&self, _model: &str) -> bool {
        false
    }
}
