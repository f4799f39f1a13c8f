//! Message-content SSE backend.
//!
//! Callers may hold either an API key or a session token from the backend's
//! web login; tokens are exchanged at `/api/auth/exchange` before every call.
//! Replies stream as SSE frames carrying `delta.message.content`, and the
//! catalog is served over GraphQL.

use crate::catalog::{fetch_models, fetch_or_fallback};
use crate::config::ProviderConfig;
use crate::credential::CredentialResolver;
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::{dispatch, spawn_stream, Endpoint};
use async_trait::async_trait;
use chatwire_core::{GatewayResult, Message, ModelInfo, SendRequest};
use chatwire_streaming::{ChatStream, SseDialect};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::info;

const DEFAULT_MODEL: &str = "standard";

const MODELS_QUERY: &str = "{ models { id name contextLength reasoning } }";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamRequest {
    model: String,
    messages: Vec<Message>,
    thinking: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
}

/// Backend speaking the message-content SSE dialect.
#[derive(Debug, Clone)]
pub struct MessagesProvider {
    endpoint: Endpoint,
    resolver: CredentialResolver,
}

impl MessagesProvider {
    /// Create from configuration. `base_url` is required.
    pub fn from_config(config: &ProviderConfig, queue: RequestQueue) -> Result<Self, ProviderError> {
        let endpoint = Endpoint::from_config(ProviderId::Messages, config, queue)?;
        let resolver =
            CredentialResolver::new(endpoint.client().clone(), endpoint.url("/api/auth/exchange"));
        Ok(Self { endpoint, resolver })
    }

    /// Connection settings.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Static catalog used when the live one is unavailable.
    #[must_use]
    pub fn fallback_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new(DEFAULT_MODEL).with_name("Standard"),
            ModelInfo::new("reasoning").with_name("Reasoning").thinking(),
        ]
    }
}

#[async_trait]
impl Provider for MessagesProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Messages
    }

    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn client(&self) -> &Client {
        self.endpoint.client()
    }

    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream> {
        request.validate()?;

        let url = self.endpoint.url("/api/chat/stream");
        let body = StreamRequest {
            model: request.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            messages: request.messages.clone(),
            thinking: request.thinking,
            temperature: request.temperature,
            conversation_id: request.conversation_id.clone(),
        };
        info!(
            provider = %self.id(),
            model = %body.model,
            url = %url,
            message_count = body.messages.len(),
            "Sending chat request"
        );

        let credential = self.endpoint.credential(&request.credential).to_string();
        let endpoint = self.endpoint.clone();
        let resolver = self.resolver.clone();
        Ok(spawn_stream(
            self.id(),
            SseDialect::message_content(),
            &request,
            move |_sink, cancel| async move {
                let key = resolver.resolve(&credential).await;
                let builder = endpoint
                    .client()
                    .post(&url)
                    .header("Authorization", format!("Bearer {key}"))
                    .header("Accept", "text/event-stream")
                    .json(&body);
                dispatch(&endpoint, &cancel, builder).await
            },
        ))
    }

    async fn list_models(&self, credential: &str) -> Vec<ModelInfo> {
        let key = self
            .resolver
            .resolve(self.endpoint.credential(credential))
            .await;
        let request = self
            .endpoint
            .client()
            .post(self.endpoint.url("/graphql"))
            .header("Authorization", format!("Bearer {key}"))
            .json(&json!({ "query": MODELS_QUERY }));
        fetch_or_fallback(self.id(), fetch_models(request), Self::fallback_models).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwire_core::{ChatEvent, GatewayError};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1In0.c2ln";

    fn provider(server: &MockServer) -> MessagesProvider {
        MessagesProvider::from_config(
            &ProviderConfig::new().with_base_url(server.uri()),
            RequestQueue::new(Duration::from_millis(1)),
        )
        .unwrap()
    }

    async fn mount_exchange(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/auth/exchange"))
            .and(body_json(json!({ "token": TOKEN })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "api_key": "key-issued" })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_requires_base_url() {
        let result = MessagesProvider::from_config(
            &ProviderConfig::new(),
            RequestQueue::new(Duration::from_millis(1)),
        );
        assert_eq!(
            result.unwrap_err(),
            ProviderError::MissingConfig("CHATWIRE_MESSAGES_BASE_URL".into())
        );
    }

    #[tokio::test]
    async fn test_token_exchanged_then_streamed() {
        let server = MockServer::start().await;
        mount_exchange(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(header("Authorization", "Bearer key-issued"))
            .and(body_partial_json(json!({
                "model": "reasoning",
                "thinking": true,
                "conversationId": "c-42"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(concat!(
                "data: {\"delta\":{\"message\":{\"content\":{\"thinking\":\"Let me see\"}}}}\n\n",
                "data: {\"delta\":{\"message\":{\"content\":{\"text\":\"Hi\"}}}}\n\n",
                "data: {\"delta\":{\"message\":{\"content\":{\"text\":\" there\"}}}}\n\n",
                "data: [DONE]\n\n",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let request = SendRequest::new(TOKEN, vec![Message::user("hello")])
            .with_model("reasoning")
            .with_thinking(true)
            .with_conversation_id("c-42");
        let events: Vec<ChatEvent> = provider(&server)
            .send_message(request)
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                ChatEvent::Thinking("Let me see".into()),
                ChatEvent::Content("Hi".into()),
                ChatEvent::Content(" there".into()),
                ChatEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_exchange_sends_original_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/exchange"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_string("session expired"))
            .expect(1)
            .mount(&server)
            .await;

        let request = SendRequest::new(TOKEN, vec![Message::user("hello")]);
        let events: Vec<ChatEvent> = provider(&server)
            .send_message(request)
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            events,
            vec![ChatEvent::Error(GatewayError::upstream(401, "session expired"))]
        );
    }

    #[tokio::test]
    async fn test_graphql_catalog() {
        let server = MockServer::start().await;
        mount_exchange(&server).await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("Authorization", "Bearer key-issued"))
            .and(body_json(json!({ "query": MODELS_QUERY })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"models": [
                    {"id": "standard", "name": "Standard", "contextLength": 100000, "reasoning": false},
                    {"id": "deep", "name": "Deep", "contextLength": 200000, "reasoning": true}
                ]}
            })))
            .mount(&server)
            .await;

        assert_eq!(
            provider(&server).list_models(TOKEN).await,
            vec![
                ModelInfo::new("standard")
                    .with_name("Standard")
                    .with_context_length(100_000),
                ModelInfo::new("deep")
                    .with_name("Deep")
                    .with_context_length(200_000)
                    .thinking(),
            ]
        );
    }

    #[tokio::test]
    async fn test_catalog_fallback_on_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{"message": "unauthorized"}]
            })))
            .mount(&server)
            .await;

        assert_eq!(
            provider(&server).list_models("raw-key").await,
            MessagesProvider::fallback_models()
        );
    }

    #[tokio::test]
    async fn test_history_unsupported() {
        let server = MockServer::start().await;
        let result = provider(&server).list_conversations("raw-key", 10).await;
        assert!(matches!(result, Err(GatewayError::Unsupported { .. })));
    }
}
