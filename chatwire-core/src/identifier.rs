//! ID generation and timestamp utilities.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a fresh conversation id.
///
/// Backends that let the client pick the id expect a plain UUID v4.
///
/// # Example
///
/// ```rust
/// use chatwire_core::identifier::generate_conversation_id;
///
/// let id = generate_conversation_id();
/// assert_eq!(id.len(), 36);
/// ```
#[must_use]
pub fn generate_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a fresh message id.
#[must_use]
pub fn generate_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 strings, and epoch values in seconds or milliseconds
/// (values above 10^11 are taken as milliseconds).
#[must_use]
pub fn parse_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        serde_json::Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}
