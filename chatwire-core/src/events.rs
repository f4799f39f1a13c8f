//! Canonical chat stream events.
//!
//! Whatever the backend's wire format, callers only ever see [`ChatEvent`]s.

use crate::errors::GatewayError;
use serde_json::{Map, Value};

/// Free-form metadata attached to a stream (titles, conversation ids, usage).
pub type Metadata = Map<String, Value>;

/// Metadata key carrying a conversation title.
pub const META_TITLE: &str = "title";

/// Metadata key carrying the backend's conversation identifier.
pub const META_CONVERSATION_ID: &str = "conversationId";

/// An event on a chat stream.
///
/// A stream yields zero or more `Content`, `Thinking` and `Metadata` events
/// followed by exactly one terminal event: `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A piece of the assistant reply.
    Content(String),
    /// A piece of reasoning output.
    Thinking(String),
    /// Out-of-band information about the conversation.
    Metadata(Metadata),
    /// The reply finished normally.
    Done,
    /// The reply failed.
    Error(GatewayError),
}

impl ChatEvent {
    /// Whether this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error(_))
    }

    /// Metadata event with a single entry.
    pub fn metadata_entry(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Metadata::new();
        map.insert(key.into(), value.into());
        ChatEvent::Metadata(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_events() {
        assert!(ChatEvent::Done.is_terminal());
        assert!(ChatEvent::Error(GatewayError::Cancelled).is_terminal());
        assert!(!ChatEvent::Content("x".into()).is_terminal());
        assert!(!ChatEvent::Thinking("x".into()).is_terminal());
    }

    #[test]
    fn test_metadata_entry() {
        let event = ChatEvent::metadata_entry(META_TITLE, "Greetings");
        match event {
            ChatEvent::Metadata(map) => assert_eq!(map[META_TITLE], "Greetings"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
