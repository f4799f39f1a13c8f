//! Chat hub backend.
//!
//! A self-hosted multi-model chat UI. Authenticated by session cookie, it
//! streams typed NDJSON updates and only exposes its conversation list as a
//! rendered page, so history listings are scraped.

use crate::catalog::{fetch_models, fetch_or_fallback};
use crate::config::ProviderConfig;
use crate::history::{
    default_anchor_pattern, fetch_json, fetch_text, parse_conversation, scrape_conversations,
};
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::{cookie_header, dispatch, spawn_stream, Endpoint};
use async_trait::async_trait;
use chatwire_core::identifier::generate_message_id;
use chatwire_core::{
    Conversation, ConversationSummary, GatewayError, GatewayResult, Message, ModelInfo,
    SendRequest,
};
use chatwire_streaming::{ChatStream, NdjsonDialect};
use regex::Regex;
use reqwest::{Client, IntoUrl, RequestBuilder};
use serde::Serialize;
use tracing::info;

const SESSION_COOKIE: &str = "hub-session";
const DEFAULT_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRequest {
    id: String,
    model: String,
    inputs: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reasoning: bool,
}

/// Cookie-authenticated NDJSON backend.
#[derive(Debug, Clone)]
pub struct HubProvider {
    endpoint: Endpoint,
    history_pattern: Option<Regex>,
}

impl HubProvider {
    /// Create from configuration. `base_url` is required.
    pub fn from_config(config: &ProviderConfig, queue: RequestQueue) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::from_config(ProviderId::Hub, config, queue)?,
            history_pattern: None,
        })
    }

    /// Connection settings.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Override the pattern used to scrape the conversation list. It must
    /// capture the id, then the title.
    #[must_use]
    pub fn with_history_pattern(mut self, pattern: Regex) -> Self {
        self.history_pattern = Some(pattern);
        self
    }

    /// Static catalog used when the live one is unavailable.
    #[must_use]
    pub fn fallback_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new(DEFAULT_MODEL).with_context_length(128_000),
            ModelInfo::new("Qwen/QwQ-32B").with_context_length(32_768).thinking(),
            ModelInfo::new("mistralai/Mistral-Small-3.1-24B-Instruct-2503")
                .with_context_length(32_768),
        ]
    }

    fn history_pattern(&self) -> &Regex {
        self.history_pattern
            .as_ref()
            .unwrap_or_else(|| default_anchor_pattern())
    }

    fn get(&self, credential: &str, url: impl IntoUrl) -> RequestBuilder {
        self.endpoint
            .client()
            .get(url)
            .header("Cookie", cookie_header(self.endpoint.credential(credential), SESSION_COOKIE))
    }
}

#[async_trait]
impl Provider for HubProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Hub
    }

    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn client(&self) -> &Client {
        self.endpoint.client()
    }

    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream> {
        request.validate()?;
        let inputs = request
            .last_user_message()
            .map(|m| m.content.clone())
            .ok_or_else(|| GatewayError::invalid_request("no user message to send"))?;

        let body = ConversationRequest {
            id: generate_message_id(),
            model: request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            inputs,
            messages: request.messages.clone(),
            conversation_id: request.conversation_id.clone(),
            temperature: request.temperature,
            reasoning: request.thinking,
        };
        let url = self.endpoint.url("/api/conversation");
        info!(
            provider = %self.id(),
            model = %body.model,
            url = %url,
            message_count = body.messages.len(),
            "Sending chat request"
        );

        let builder = self
            .endpoint
            .client()
            .post(url)
            .header(
                "Cookie",
                cookie_header(self.endpoint.credential(&request.credential), SESSION_COOKIE),
            )
            .header("Accept", "application/x-ndjson")
            .json(&body);
        let endpoint = self.endpoint.clone();
        Ok(spawn_stream(
            self.id(),
            NdjsonDialect::new(),
            &request,
            move |_sink, cancel| async move { dispatch(&endpoint, &cancel, builder).await },
        ))
    }

    async fn list_models(&self, credential: &str) -> Vec<ModelInfo> {
        let request = self.get(credential, self.endpoint.url("/api/models"));
        fetch_or_fallback(self.id(), fetch_models(request), Self::fallback_models).await
    }

    async fn list_conversations(
        &self,
        credential: &str,
        limit: usize,
    ) -> GatewayResult<Vec<ConversationSummary>> {
        let html = fetch_text(self.get(credential, self.endpoint.url("/"))).await?;
        Ok(scrape_conversations(&html, self.history_pattern(), limit))
    }

    async fn get_conversation(&self, credential: &str, id: &str) -> GatewayResult<Conversation> {
        let url = self.endpoint.resource_url("/api/conversation", id)?;
        let body = fetch_json(self.get(credential, url)).await?;
        parse_conversation(&body, id)
    }
}
