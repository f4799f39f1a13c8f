//! Chat-completions backends (OpenAI, OpenRouter, DeepSeek, Groq).
//!
//! All four speak the same protocol: a bearer-authenticated JSON POST to
//! `/chat/completions` answered by an SSE stream of `choices[0].delta`
//! frames ending with `data: [DONE]`. The presets only differ in origin,
//! default model, a few request extensions and their fallback catalog.

use crate::catalog::{fetch_models, fetch_or_fallback};
use crate::config::ProviderConfig;
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::{dispatch, spawn_stream, Endpoint};
use async_trait::async_trait;
use chatwire_core::{GatewayResult, Message, ModelInfo, SendRequest};
use chatwire_streaming::{ChatStream, SseDialect};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::info;

/// Title sent to backends that attribute traffic to an application.
const APP_TITLE: &str = "chatwire";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_reasoning: Option<bool>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// ============================================================================
// Provider
// ============================================================================

/// A chat-completions backend.
#[derive(Debug, Clone)]
pub struct ChatCompletionsProvider {
    endpoint: Endpoint,
}

impl ChatCompletionsProvider {
    /// Create a preset backend from configuration.
    ///
    /// `id` must be one of the chat-completions presets.
    pub fn from_config(
        id: ProviderId,
        config: &ProviderConfig,
        queue: RequestQueue,
    ) -> Result<Self, ProviderError> {
        if !id.is_chat_completions() {
            return Err(ProviderError::UnknownProvider(format!(
                "{id} is not a chat-completions backend"
            )));
        }
        Ok(Self {
            endpoint: Endpoint::from_config(id, config, queue)?,
        })
    }

    /// Connection settings.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Model used when the request names none.
    #[must_use]
    pub fn default_model(&self, thinking: bool) -> &'static str {
        match self.endpoint.id() {
            ProviderId::OpenRouter => "openai/gpt-4o-mini",
            ProviderId::DeepSeek if thinking => "deepseek-reasoner",
            ProviderId::DeepSeek => "deepseek-chat",
            ProviderId::Groq => "llama-3.3-70b-versatile",
            _ => "gpt-4o-mini",
        }
    }

    /// Static catalog used when the live one is unavailable.
    #[must_use]
    pub fn fallback_models(&self) -> Vec<ModelInfo> {
        match self.endpoint.id() {
            ProviderId::OpenRouter => vec![
                ModelInfo::new("openai/gpt-4o-mini").with_context_length(128_000),
                ModelInfo::new("anthropic/claude-3.5-sonnet").with_context_length(200_000),
                ModelInfo::new("deepseek/deepseek-r1")
                    .with_context_length(64_000)
                    .thinking(),
            ],
            ProviderId::DeepSeek => vec![
                ModelInfo::new("deepseek-chat").with_context_length(64_000),
                ModelInfo::new("deepseek-reasoner")
                    .with_context_length(64_000)
                    .thinking(),
            ],
            ProviderId::Groq => vec![
                ModelInfo::new("llama-3.3-70b-versatile").with_context_length(128_000),
                ModelInfo::new("mixtral-8x7b-32768").with_context_length(32_768),
                ModelInfo::new("gemma2-9b-it").with_context_length(8_192),
            ],
            _ => vec![
                ModelInfo::new("gpt-4o-mini").with_context_length(128_000),
                ModelInfo::new("gpt-4o").with_context_length(128_000),
                ModelInfo::new("o3-mini").with_context_length(200_000).thinking(),
            ],
        }
    }

    fn build_request(&self, request: &SendRequest, model: &str) -> RequestBuilder {
        let id = self.endpoint.id();
        let body = ChatCompletionRequest {
            model,
            messages: &request.messages,
            stream: true,
            temperature: request.temperature,
            stream_options: (id == ProviderId::OpenAi).then_some(StreamOptions {
                include_usage: true,
            }),
            include_reasoning: (id == ProviderId::OpenRouter && request.thinking).then_some(true),
        };

        let key = self.endpoint.credential(&request.credential);
        let mut builder = self
            .endpoint
            .client()
            .post(self.endpoint.url("/chat/completions"))
            .header("Authorization", format!("Bearer {key}"))
            .header("Accept", "text/event-stream")
            .json(&body);
        if id == ProviderId::OpenRouter {
            builder = builder.header("X-Title", APP_TITLE);
        }
        builder
    }
}

#[async_trait]
impl Provider for ChatCompletionsProvider {
    fn id(&self) -> ProviderId {
        self.endpoint.id()
    }

    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn client(&self) -> &Client {
        self.endpoint.client()
    }

    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream> {
        request.validate()?;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model(request.thinking).to_string());
        info!(
            provider = %self.id(),
            model = %model,
            url = %self.endpoint.url("/chat/completions"),
            message_count = request.messages.len(),
            "Sending chat request"
        );

        let builder = self.build_request(&request, &model);
        let endpoint = self.endpoint.clone();
        Ok(spawn_stream(
            self.id(),
            SseDialect::chat_completions(),
            &request,
            move |_sink, cancel| async move { dispatch(&endpoint, &cancel, builder).await },
        ))
    }

    async fn list_models(&self, credential: &str) -> Vec<ModelInfo> {
        let key = self.endpoint.credential(credential);
        let request = self
            .endpoint
            .client()
            .get(self.endpoint.url("/models"))
            .header("Authorization", format!("Bearer {key}"));
        fetch_or_fallback(self.id(), fetch_models(request), || self.fallback_models()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::{ChatEvent, GatewayError};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn provider(id: ProviderId, server: &MockServer) -> ChatCompletionsProvider {
        ChatCompletionsProvider::from_config(
            id,
            &ProviderConfig::new().with_base_url(server.uri()),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap()
    }

    fn hello() -> SendRequest {
        SendRequest::new("sk-test", vec![Message::user("Say hello")])
    }

    #[test]
    fn test_rejects_non_preset() {
        let result = ChatCompletionsProvider::from_config(
            ProviderId::Hub,
            &ProviderConfig::new().with_base_url("https://hub.example.com"),
            RequestQueue::new(Duration::from_millis(1)),
        );
        assert!(matches!(result, Err(ProviderError::UnknownProvider(_))));
    }

    #[test]
    fn test_default_models() {
        let queue = RequestQueue::new(Duration::from_millis(1));
        let deepseek =
            ChatCompletionsProvider::from_config(ProviderId::DeepSeek, &ProviderConfig::new(), queue)
                .unwrap();
        assert_eq!(deepseek.default_model(false), "deepseek-chat");
        assert_eq!(deepseek.default_model(true), "deepseek-reasoner");
        assert_eq!(deepseek.base_url(), "https://api.deepseek.com/v1");
    }

    #[tokio::test]
    async fn test_streams_content_then_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "stream": true,
                "stream_options": {"include_usage": true},
                "messages": [{"role": "user", "content": "Say hello"}]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(SSE_BODY),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stream = provider(ProviderId::OpenAi, &server)
            .send_message(hello())
            .unwrap();
        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Content("He".into()),
                ChatEvent::Content("llo".into()),
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_openrouter_extensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("X-Title", APP_TITLE))
            .and(body_partial_json(json!({
                "model": "deepseek/deepseek-r1",
                "include_reasoning": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                "data: {\"choices\":[{\"delta\":{\"reasoning\":\"hmm\"}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}],\"usage\":{\"total_tokens\":7}}\n",
                "data: [DONE]\n",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let request = hello()
            .with_model("deepseek/deepseek-r1")
            .with_thinking(true);
        let stream = provider(ProviderId::OpenRouter, &server)
            .send_message(request)
            .unwrap();
        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Thinking("hmm".into()),
                ChatEvent::Content("ok".into()),
                ChatEvent::metadata_entry("usage", json!({"total_tokens": 7})),
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let stream = provider(ProviderId::Groq, &server)
            .send_message(hello())
            .unwrap();
        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![ChatEvent::Error(GatewayError::upstream(401, "invalid api key"))]
        );
    }

    #[tokio::test]
    async fn test_in_stream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n",
                "data: {\"error\":{\"message\":\"context length exceeded\"}}\n",
            )))
            .mount(&server)
            .await;

        let stream = provider(ProviderId::DeepSeek, &server)
            .send_message(hello())
            .unwrap();
        let events: Vec<ChatEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Content("par".into()),
                ChatEvent::Error(GatewayError::backend("context length exceeded")),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_messages_rejected_synchronously() {
        let server = MockServer::start().await;
        let result = provider(ProviderId::OpenAi, &server)
            .send_message(SendRequest::new("sk-test", Vec::new()));
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_models_live_and_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [{"id": "gpt-4.1"}, {"id": "o4-mini"}]
            })))
            .mount(&server)
            .await;

        let openai = provider(ProviderId::OpenAi, &server);
        assert_eq!(
            openai.list_models("sk-test").await,
            vec![ModelInfo::new("gpt-4.1"), ModelInfo::new("o4-mini")]
        );

        let failing = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&failing)
            .await;
        let groq = provider(ProviderId::Groq, &failing);
        assert_eq!(groq.list_models("gsk-test").await, groq.fallback_models());
    }
}
