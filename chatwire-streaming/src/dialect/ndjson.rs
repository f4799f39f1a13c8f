//! Newline-delimited JSON dialect.
//!
//! One object per line, discriminated by `type`. Batched lines carry an
//! `updates` array whose entries are classified the same way.

use super::{error_message, ignore, non_empty_str, or_ignore, Dialect, StreamEvent};
use serde_json::Value;
use tracing::trace;

/// Dialect for typed NDJSON update lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdjsonDialect;

impl NdjsonDialect {
    /// Create the dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for NdjsonDialect {
    fn name(&self) -> &'static str {
        "ndjson"
    }

    fn classify(&self, line: &str) -> Vec<StreamEvent> {
        let line = line.trim();
        if line.is_empty() {
            return ignore();
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                trace!(dialect = self.name(), error = %e, "Skipping unparseable NDJSON line");
                return ignore();
            }
        };

        let mut events = Vec::new();
        classify_value(&value, &mut events);
        or_ignore(events)
    }
}

fn classify_value(value: &Value, events: &mut Vec<StreamEvent>) {
    match value.get("type").and_then(Value::as_str) {
        Some("stream") => {
            if let Some(token) = non_empty_str(value.get("token")) {
                events.push(StreamEvent::Content(token.to_owned()));
            }
        }
        Some("reasoning") => {
            let text = non_empty_str(value.get("token")).or_else(|| non_empty_str(value.get("text")));
            if let Some(text) = text {
                events.push(StreamEvent::Thinking(text.to_owned()));
            }
        }
        Some("title") => {
            if let Some(title) = non_empty_str(value.get("title")) {
                events.push(StreamEvent::Title(title.to_owned()));
            }
        }
        Some("conversation") => {
            let id = non_empty_str(value.get("id"))
                .or_else(|| non_empty_str(value.get("conversationId")));
            if let Some(id) = id {
                events.push(StreamEvent::SessionId(id.to_owned()));
            }
        }
        Some("error") => {
            let message = value
                .get("message")
                .map(error_message)
                .unwrap_or_else(|| "unknown error".to_owned());
            events.push(StreamEvent::Error(message));
        }
        _ => {}
    }

    if let Some(updates) = value.get("updates").and_then(Value::as_array) {
        for update in updates {
            classify_value(update, events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"type":"stream","token":"Hi"}"#, StreamEvent::Content("Hi".into()))]
    #[case(r#"{"type":"reasoning","token":"hmm"}"#, StreamEvent::Thinking("hmm".into()))]
    #[case(r#"{"type":"title","title":"Greetings"}"#, StreamEvent::Title("Greetings".into()))]
    #[case(r#"{"type":"conversation","id":"abc"}"#, StreamEvent::SessionId("abc".into()))]
    #[case(r#"{"type":"conversation","conversationId":"def"}"#, StreamEvent::SessionId("def".into()))]
    #[case(r#"{"type":"error","message":"overloaded"}"#, StreamEvent::Error("overloaded".into()))]
    fn test_typed_lines(#[case] line: &str, #[case] expected: StreamEvent) {
        assert_eq!(NdjsonDialect::new().classify(line), vec![expected]);
    }

    #[test]
    fn test_nested_updates() {
        let events = NdjsonDialect::new().classify(
            r#"{"updates":[{"type":"stream","token":"a"},{"type":"status","status":"started"},{"type":"stream","token":"b"},{"updates":[{"type":"title","title":"T"}]}]}"#,
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Content("a".into()),
                StreamEvent::Content("b".into()),
                StreamEvent::Title("T".into())
            ]
        );
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case(r#"{"type":"status","status":"keepAlive"}"#)]
    #[case(r#"{"type":"stream","token":""}"#)]
    #[case(r#"{"type":"stream","tok"#)]
    #[case("[1,2,3]")]
    fn test_ignored_lines(#[case] line: &str) {
        assert_eq!(NdjsonDialect::new().classify(line), vec![StreamEvent::Ignore]);
    }
}
