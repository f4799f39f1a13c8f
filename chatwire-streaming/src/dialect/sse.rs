//! Server-Sent Events dialect.
//!
//! Only `data:` lines carry payload. The literal `[DONE]` ends the stream;
//! everything else is JSON whose text lives at a backend-specific path.

use super::{error_message, ignore, non_empty_str, or_ignore, Dialect, StreamEvent};
use chatwire_core::Metadata;
use serde_json::Value;
use tracing::trace;

/// End-of-stream sentinel sent as an SSE payload.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// Where the text delta lives in each SSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaPath {
    /// `choices[0].delta.content`, with reasoning in
    /// `choices[0].delta.reasoning_content` or `.reasoning`.
    ChatCompletions,
    /// `delta.message.content.text`, with reasoning in
    /// `delta.message.content.thinking`.
    MessageContent,
}

/// SSE dialect parameterized by delta path.
#[derive(Debug, Clone, Copy)]
pub struct SseDialect {
    path: DeltaPath,
}

impl SseDialect {
    /// Create a dialect reading deltas at `path`.
    #[must_use]
    pub const fn new(path: DeltaPath) -> Self {
        Self { path }
    }

    /// Dialect for chat-completions style payloads.
    #[must_use]
    pub const fn chat_completions() -> Self {
        Self::new(DeltaPath::ChatCompletions)
    }

    /// Dialect for message-content style payloads.
    #[must_use]
    pub const fn message_content() -> Self {
        Self::new(DeltaPath::MessageContent)
    }
}

impl Dialect for SseDialect {
    fn name(&self) -> &'static str {
        match self.path {
            DeltaPath::ChatCompletions => "sse/chat-completions",
            DeltaPath::MessageContent => "sse/message-content",
        }
    }

    fn classify(&self, line: &str) -> Vec<StreamEvent> {
        let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
            return ignore();
        };
        let payload = payload.trim();

        if payload == DONE_SENTINEL {
            return vec![StreamEvent::Done];
        }
        if payload.is_empty() {
            return ignore();
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                trace!(dialect = self.name(), error = %e, "Skipping unparseable SSE payload");
                return ignore();
            }
        };

        let events = match self.path {
            DeltaPath::ChatCompletions => chat_completion_events(&value),
            DeltaPath::MessageContent => message_content_events(&value),
        };
        or_ignore(events)
    }
}

fn chat_completion_events(value: &Value) -> Vec<StreamEvent> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return vec![StreamEvent::Error(error_message(error))];
    }

    let mut events = Vec::new();
    if let Some(delta) = value.pointer("/choices/0/delta") {
        let reasoning = non_empty_str(delta.get("reasoning_content"))
            .or_else(|| non_empty_str(delta.get("reasoning")));
        if let Some(text) = reasoning {
            events.push(StreamEvent::Thinking(text.to_owned()));
        }
        if let Some(text) = non_empty_str(delta.get("content")) {
            events.push(StreamEvent::Content(text.to_owned()));
        }
    }

    if let Some(usage) = value.get("usage").filter(|u| u.is_object()) {
        let mut meta = Metadata::new();
        meta.insert("usage".to_owned(), usage.clone());
        events.push(StreamEvent::Meta(meta));
    }

    events
}

fn message_content_events(value: &Value) -> Vec<StreamEvent> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return vec![StreamEvent::Error(error_message(error))];
    }

    let mut events = Vec::new();
    if let Some(content) = value.pointer("/delta/message/content") {
        if let Some(text) = non_empty_str(content.get("thinking")) {
            events.push(StreamEvent::Thinking(text.to_owned()));
        }
        if let Some(text) = non_empty_str(content.get("text")) {
            events.push(StreamEvent::Content(text.to_owned()));
        }
    }
    events
}
