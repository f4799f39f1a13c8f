//! Wire dialects.
//!
//! A dialect classifies one complete line of a response body into typed
//! [`StreamEvent`]s. Lines a dialect does not understand, including malformed
//! JSON, classify as [`StreamEvent::Ignore`] and never abort the stream.

mod ndjson;
mod patch;
mod sse;

pub use ndjson::NdjsonDialect;
pub use patch::PatchDialect;
pub use sse::{DeltaPath, SseDialect, DONE_SENTINEL};

use chatwire_core::{ChatEvent, GatewayError, Metadata, META_CONVERSATION_ID, META_TITLE};
use serde_json::Value;

/// An event classified from a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Reply text.
    Content(String),
    /// Reasoning text.
    Thinking(String),
    /// Conversation title.
    Title(String),
    /// Backend conversation id.
    SessionId(String),
    /// Other metadata (usage and similar).
    Meta(Metadata),
    /// Error reported by the backend inside the stream.
    Error(String),
    /// End-of-stream sentinel.
    Done,
    /// Nothing of interest on this line.
    Ignore,
}

impl StreamEvent {
    /// Map to the canonical event delivered to callers.
    ///
    /// `Done` and `Ignore` have no direct counterpart: the session decides
    /// when a stream completes.
    #[must_use]
    pub fn into_chat_event(self) -> Option<ChatEvent> {
        match self {
            StreamEvent::Content(text) => Some(ChatEvent::Content(text)),
            StreamEvent::Thinking(text) => Some(ChatEvent::Thinking(text)),
            StreamEvent::Title(title) => Some(ChatEvent::metadata_entry(META_TITLE, title)),
            StreamEvent::SessionId(id) => {
                Some(ChatEvent::metadata_entry(META_CONVERSATION_ID, id))
            }
            StreamEvent::Meta(map) => Some(ChatEvent::Metadata(map)),
            StreamEvent::Error(message) => Some(ChatEvent::Error(GatewayError::backend(message))),
            StreamEvent::Done | StreamEvent::Ignore => None,
        }
    }
}

/// Classifies complete lines of one backend's wire format.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Classify one complete line.
    ///
    /// Always returns at least one event; unknown lines yield `[Ignore]`.
    fn classify(&self, line: &str) -> Vec<StreamEvent>;
}

pub(crate) fn ignore() -> Vec<StreamEvent> {
    vec![StreamEvent::Ignore]
}

pub(crate) fn or_ignore(events: Vec<StreamEvent>) -> Vec<StreamEvent> {
    if events.is_empty() {
        ignore()
    } else {
        events
    }
}

pub(crate) fn non_empty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Best-effort message from an `error` field, which backends send as a
/// string, an object with `message`, or something else entirely.
pub(crate) fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}
