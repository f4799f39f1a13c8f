//! Conversation history types.

use crate::messages::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a conversation listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Backend conversation id.
    pub id: String,
    /// Title as shown by the backend.
    pub title: String,
    /// Last activity, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationSummary {
    /// Create a summary without a timestamp.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            updated_at: None,
        }
    }
}

/// A full conversation fetched from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Backend conversation id.
    pub id: String,
    /// Title, if any.
    pub title: String,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
}
