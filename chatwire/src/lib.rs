//! # chatwire - Multi-Provider Chat-Streaming Gateway
//!
//! chatwire sends one request shape to many chat backends and hands back one
//! event stream, whatever the backend's authentication, payload or wire
//! format. Outbound calls are serialized through rate-limited FIFO queues.
//!
//! ## Quick Start
//!
//! ```ignore
//! use chatwire::prelude::*;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     chatwire::telemetry::init_tracing();
//!     let gateway = Gateway::from_env()?;
//!
//!     let request = SendRequest::new("sk-...", vec![Message::user("Hello!")]);
//!     let mut stream = gateway.send("openai", request)?;
//!     while let Some(event) = stream.next().await {
//!         match event {
//!             ChatEvent::Content(text) => print!("{text}"),
//!             ChatEvent::Error(e) => eprintln!("error: {e}"),
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! | Provider | Auth | Wire format |
//! |----------|------|-------------|
//! | `openai`, `openrouter`, `deepseek`, `groq` | bearer key | SSE chat completions |
//! | `messages` | key or exchanged session token | SSE message content |
//! | `threads` | session cookie | numbered patch stream |
//! | `hub` | session cookie | NDJSON |
//! | `archive` | session cookie | history only |
//!
//! ## Architecture
//!
//! chatwire is organized as a workspace of focused crates:
//!
//! - [`chatwire_core`] - Messages, events, errors and catalog/history types
//! - [`chatwire_streaming`] - Line framing, wire dialects and the event channel
//! - [`chatwire_providers`] - Backends, request queue, registry, credentials

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod gateway;
pub mod handlers;
pub mod telemetry;

// ============================================================================
// Crate Re-exports
// ============================================================================

/// Core types.
pub use chatwire_core as core;

/// Stream framing and dialects.
pub use chatwire_streaming as streaming;

/// Backends and the request queue.
pub use chatwire_providers as providers;

// ============================================================================
// Type Re-exports
// ============================================================================

pub use chatwire_core::{
    ChatEvent, Conversation, ConversationSummary, GatewayError, GatewayResult, Message,
    ModelInfo, Role, SendRequest,
};
pub use chatwire_providers::{
    Backend, Provider, ProviderConfig, ProviderError, ProviderId, ProviderRegistry, RequestQueue,
};
pub use chatwire_streaming::{ChatStream, StreamCallbacks};
pub use gateway::{Gateway, GatewayConfig, QueueScope};
pub use handlers::{AccountStore, HandlerResponse};

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient prelude for common imports.
///
/// ```ignore
/// use chatwire::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{ChatEvent, GatewayError, GatewayResult, Message, Role, SendRequest};
    pub use crate::gateway::{Gateway, GatewayConfig, QueueScope};
    pub use crate::providers::{Provider, ProviderConfig, ProviderId};
    pub use crate::streaming::{ChatStream, StreamCallbacks};
}

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of chatwire.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
