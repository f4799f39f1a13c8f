//! Numbered patch stream dialect.
//!
//! Each line is `<int>:<json>`. The JSON carries a list of document patches,
//! either at the top level or wrapped under `json`; text arrives as `append`
//! or `add` operations on paths ending in `/text`.

use super::{ignore, or_ignore, Dialect, StreamEvent};
use serde_json::Value;
use tracing::trace;

/// Dialect for `<n>:<json>` patch lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchDialect;

impl PatchDialect {
    /// Create the dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PatchDialect {
    fn name(&self) -> &'static str {
        "patch"
    }

    fn classify(&self, line: &str) -> Vec<StreamEvent> {
        let line = line.trim();
        let Some((prefix, payload)) = line.split_once(':') else {
            return ignore();
        };
        if prefix.trim().parse::<u64>().is_err() {
            return ignore();
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                trace!(dialect = self.name(), error = %e, "Skipping unparseable patch frame");
                return ignore();
            }
        };
        let body = value.get("json").unwrap_or(&value);

        let mut events = Vec::new();
        if let Some(id) = body.get("chatId").and_then(Value::as_str) {
            events.push(StreamEvent::SessionId(id.to_owned()));
        }
        if let Some(patches) = body.get("patches").and_then(Value::as_array) {
            events.extend(patches.iter().filter_map(text_patch));
        }
        or_ignore(events)
    }
}

fn text_patch(patch: &Value) -> Option<StreamEvent> {
    let op = patch.get("op")?.as_str()?;
    let path = patch.get("path")?.as_str()?;
    if !matches!(op, "append" | "add") || !path.ends_with("/text") {
        return None;
    }
    let text = patch.get("value")?.as_str()?;
    (!text.is_empty()).then(|| StreamEvent::Content(text.to_owned()))
}
