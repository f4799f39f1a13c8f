//! Two-phase threads backend.
//!
//! The backend keeps the conversation server-side. A new conversation is
//! opened with a `start` call, then each user turn is sent with an `append`
//! call whose response is a numbered patch stream. Authentication is by
//! session cookie.

use crate::catalog::{fetch_models, fetch_or_fallback};
use crate::config::ProviderConfig;
use crate::history::{fetch_json, fetch_structured, parse_conversation};
use crate::provider::{Provider, ProviderError};
use crate::queue::RequestQueue;
use crate::registry::ProviderId;
use crate::transport::{cookie_header, dispatch, spawn_stream, Endpoint};
use async_trait::async_trait;
use chatwire_core::identifier::generate_conversation_id;
use chatwire_core::{
    ChatEvent, Conversation, ConversationSummary, GatewayError, GatewayResult, ModelInfo,
    SendRequest, META_CONVERSATION_ID,
};
use chatwire_streaming::{ChatStream, EventSink, PatchDialect};
use reqwest::{Client, IntoUrl, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const SESSION_COOKIE: &str = "session";
const DEFAULT_MODEL: &str = "auto";

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum ChatCall {
    Start {
        id: String,
        model: String,
    },
    Append {
        #[serde(rename = "chatId")]
        chat_id: String,
        content: String,
        model: String,
        thinking: bool,
    },
}

/// Cookie-authenticated backend with server-side threads.
#[derive(Debug, Clone)]
pub struct ThreadsProvider {
    endpoint: Endpoint,
}

impl ThreadsProvider {
    /// Create from configuration. `base_url` is required.
    pub fn from_config(config: &ProviderConfig, queue: RequestQueue) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: Endpoint::from_config(ProviderId::Threads, config, queue)?,
        })
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
            ModelInfo::new(DEFAULT_MODEL).with_name("Auto"),
            ModelInfo::new("auto-reasoning").with_name("Auto (reasoning)").thinking(),
        ]
    }

    fn get(&self, credential: &str, url: impl IntoUrl) -> RequestBuilder {
        self.endpoint
            .client()
            .get(url)
            .header("Cookie", cookie_header(self.endpoint.credential(credential), SESSION_COOKIE))
    }
}

/// Open a thread and announce its id on `sink`.
async fn start_thread(
    endpoint: &Endpoint,
    cookie: &str,
    model: &str,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> GatewayResult<String> {
    let requested = generate_conversation_id();
    let call = ChatCall::Start {
        id: requested.clone(),
        model: model.to_string(),
    };
    let builder = endpoint
        .client()
        .post(endpoint.url("/api/chat"))
        .header("Cookie", cookie)
        .json(&call);
    let response = dispatch(endpoint, cancel, builder).await?;
    let chat_id = started_chat_id(endpoint.id(), response.text().await, requested);

    debug!(provider = %endpoint.id(), chat_id = %chat_id, "Thread started");
    sink.send(ChatEvent::metadata_entry(META_CONVERSATION_ID, chat_id.as_str()));
    Ok(chat_id)
}

/// The id the backend assigned in a start response.
///
/// Some deployments answer with an empty body; `requested` stands then, and
/// also when the body could not be read.
fn started_chat_id<E: Display>(
    provider: ProviderId,
    body: Result<String, E>,
    requested: String,
) -> String {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            debug!(provider = %provider, error = %e, "Thread start response unreadable");
            return requested;
        }
    };
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            let doc = value.get("json").unwrap_or(&value);
            ["chatId", "id"]
                .iter()
                .find_map(|key| doc.get(key).and_then(Value::as_str))
                .map(str::to_string)
        })
        .filter(|id| !id.is_empty())
        .unwrap_or(requested)
}

#[async_trait]
impl Provider for ThreadsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Threads
    }

    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    fn client(&self) -> &Client {
        self.endpoint.client()
    }

    fn send_message(&self, request: SendRequest) -> GatewayResult<ChatStream> {
        request.validate()?;
        let content = request
            .last_user_message()
            .map(|m| m.content.clone())
            .ok_or_else(|| GatewayError::invalid_request("no user message to send"))?;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        info!(
            provider = %self.id(),
            model = %model,
            url = %self.endpoint.url("/api/chat"),
            existing = request.conversation_id.is_some(),
            "Sending chat request"
        );

        let cookie = cookie_header(self.endpoint.credential(&request.credential), SESSION_COOKIE);
        let existing = request.conversation_id.clone();
        let thinking = request.thinking;
        let endpoint = self.endpoint.clone();
        Ok(spawn_stream(
            self.id(),
            PatchDialect::new(),
            &request,
            move |sink, cancel| async move {
                let chat_id = match existing {
                    Some(id) => id,
                    None => start_thread(&endpoint, &cookie, &model, &sink, &cancel).await?,
                };
                let call = ChatCall::Append {
                    chat_id,
                    content,
                    model,
                    thinking,
                };
                let builder = endpoint
                    .client()
                    .post(endpoint.url("/api/chat"))
                    .header("Cookie", cookie.as_str())
                    .json(&call);
                dispatch(&endpoint, &cancel, builder).await
            },
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
        fetch_structured(self.get(credential, self.endpoint.url("/api/chats")), limit).await
    }

    async fn get_conversation(&self, credential: &str, id: &str) -> GatewayResult<Conversation> {
        let url = self.endpoint.resource_url("/api/chats", id)?;
        let body = fetch_json(self.get(credential, url)).await?;
        parse_conversation(&body, id)
    }
}
