//! Conversation history, structured or scraped.
//!
//! Structured backends return JSON listings. Others only render HTML, which
//! is scraped with a regex matching conversation anchors. Scraping depends on
//! markup the backend does not document: when it shifts, listings come back
//! empty rather than failing.

use chatwire_core::identifier::parse_timestamp;
use chatwire_core::{Conversation, ConversationSummary, GatewayError, GatewayResult, Message, Role};
use regex::Regex;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, warn};

const UNTITLED: &str = "Untitled";

/// Anchor pattern matching `href=".../conversation/<id>"` or `.../chat/<id>`
/// followed by the first text node inside the anchor.
pub fn default_anchor_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Skips nested non-anchor tags so an empty anchor never borrows the
        // next anchor's title.
        Regex::new(
            r#"href="[^"]*/(?:conversation|chat|c)/([A-Za-z0-9_-]+)"[^>]*>\s*(?:<(?:[^/a>]|/[^a>])[^>]*>\s*)*([^<]*?)\s*<"#,
        )
        .expect("anchor pattern is a valid regex")
    })
}

/// Extract conversation summaries from `html`.
///
/// `pattern` must have two capture groups: id, then title. Ids are
/// deduplicated (first occurrence wins) and the result is truncated to
/// `limit`. Zero matches, or a pattern with fewer groups, yields an empty
/// list.
#[must_use]
pub fn scrape_conversations(html: &str, pattern: &Regex, limit: usize) -> Vec<ConversationSummary> {
    if pattern.captures_len() < 3 {
        warn!(pattern = %pattern, "History pattern needs id and title groups");
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let conversations: Vec<ConversationSummary> = pattern
        .captures_iter(html)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str().trim();
            if id.is_empty() || !seen.insert(id.to_string()) {
                return None;
            }
            let title = caps
                .get(2)
                .map(|m| unescape_html(m.as_str().trim()))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            Some(ConversationSummary::new(id, title))
        })
        .take(limit)
        .collect();

    if conversations.is_empty() {
        debug!("No conversations matched in history page");
    }
    conversations
}

/// Decode the handful of entities conversation titles actually contain.
#[must_use]
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Send `request` and return its body as text, mapping failures.
pub async fn fetch_text(request: RequestBuilder) -> GatewayResult<String> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::transport(e.to_string()))?;
    if !status.is_success() {
        return Err(GatewayError::upstream(status.as_u16(), body));
    }
    Ok(body)
}

/// Send `request` and parse the JSON body.
pub async fn fetch_json(request: RequestBuilder) -> GatewayResult<Value> {
    let body = fetch_text(request).await?;
    serde_json::from_str(&body)
        .map_err(|e| GatewayError::Stream(format!("invalid JSON in history response: {e}")))
}

/// Fetch a structured listing.
pub async fn fetch_structured(
    request: RequestBuilder,
    limit: usize,
) -> GatewayResult<Vec<ConversationSummary>> {
    let body = fetch_json(request).await?;
    let mut conversations = parse_summaries(&body);
    conversations.truncate(limit);
    Ok(conversations)
}

/// Map a JSON listing (bare array, or under `items`, `data`, `chats` or
/// `conversations`) to summaries. Entries without an id are skipped.
#[must_use]
pub fn parse_summaries(body: &Value) -> Vec<ConversationSummary> {
    let entries = body.as_array().or_else(|| {
        ["items", "data", "chats", "conversations"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_array))
    });
    let Some(entries) = entries else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .filter_map(|entry| {
            let id = entry_id(entry)?;
            if !seen.insert(id.to_string()) {
                return None;
            }
            let mut summary = ConversationSummary::new(id, entry_title(entry));
            summary.updated_at = ["updatedAt", "updated_at", "createdAt", "created_at"]
                .iter()
                .find_map(|key| entry.get(key).and_then(parse_timestamp));
            Some(summary)
        })
        .collect()
}

/// Map a single conversation document (optionally under `conversation` or
/// `chat`). Messages with an unknown role or no text are skipped.
pub fn parse_conversation(body: &Value, fallback_id: &str) -> GatewayResult<Conversation> {
    let doc = body
        .get("conversation")
        .or_else(|| body.get("chat"))
        .unwrap_or(body);
    if !doc.is_object() {
        return Err(GatewayError::Stream("conversation response is not an object".into()));
    }

    let messages = doc
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| messages.iter().filter_map(parse_message).collect())
        .unwrap_or_default();

    Ok(Conversation {
        id: entry_id(doc).unwrap_or(fallback_id).to_string(),
        title: entry_title(doc),
        messages,
    })
}

fn parse_message(value: &Value) -> Option<Message> {
    let role: Role = ["role", "from", "author"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))?
        .parse()
        .ok()?;
    let content = ["content", "text"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))?;
    Some(Message::new(role, content))
}

fn entry_id(entry: &Value) -> Option<&str> {
    ["id", "_id", "chatId", "conversationId"]
        .iter()
        .find_map(|key| entry.get(key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
}

fn entry_title(entry: &Value) -> String {
    entry
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}
