//! # chatwire-core
//!
//! Core types, messages, events and error handling for chatwire.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Messages**: [`Message`], [`Role`] and the [`SendRequest`] a caller builds
//! - **Events**: the canonical [`ChatEvent`] stream every backend is normalized into
//! - **Errors**: [`GatewayError`], the single error type observable on a stream
//! - **Catalog**: [`ModelInfo`], a normalized model entry
//! - **History**: [`ConversationSummary`] and [`Conversation`]
//! - **Identifiers**: conversation ids and timestamp parsing
//!
//! ## Example
//!
//! ```rust
//! use chatwire_core::{Message, SendRequest};
//! use std::time::Duration;
//!
//! let request = SendRequest::new("sk-...", vec![Message::user("Hello!")])
//!     .with_model("gpt-4o-mini")
//!     .with_deadline(Duration::from_secs(60));
//!
//! request.validate().expect("request has messages");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod catalog;
pub mod errors;
pub mod events;
pub mod history;
pub mod identifier;
pub mod messages;

// Re-exports for convenience
pub use catalog::ModelInfo;
pub use errors::{GatewayError, GatewayResult};
pub use events::{ChatEvent, Metadata, META_CONVERSATION_ID, META_TITLE};
pub use history::{Conversation, ConversationSummary};
pub use identifier::{generate_conversation_id, generate_message_id, parse_timestamp};
pub use messages::{Message, Role, SendRequest};

/// Prelude module for common imports.
///
/// ```rust
/// use chatwire_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::catalog::ModelInfo;
    pub use crate::errors::{GatewayError, GatewayResult};
    pub use crate::events::{ChatEvent, Metadata};
    pub use crate::history::{Conversation, ConversationSummary};
    pub use crate::messages::{Message, Role, SendRequest};
}
