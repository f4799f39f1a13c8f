//! # chatwire-streaming
//!
//! Streaming support for chatwire.
//!
//! This crate turns a chunked HTTP response body into the canonical
//! [`ChatEvent`](chatwire_core::ChatEvent) stream, whatever wire format the
//! backend speaks.
//!
//! ## Core Concepts
//!
//! - **[`LineFramer`]**: Reassemble complete lines from arbitrary byte chunks
//! - **[`Dialect`]**: Classify one line into typed [`StreamEvent`]s
//!   ([`SseDialect`], [`PatchDialect`], [`NdjsonDialect`])
//! - **[`StreamSession`]**: Per-request state machine feeding an [`EventSink`]
//! - **[`ChatStream`]**: The caller's end, consumed as a `Stream`, with
//!   callbacks, or collected into text
//!
//! ## Example
//!
//! ```ignore
//! use chatwire_streaming::{chat_channel, SseDialect, StreamSession};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let (sink, stream) = chat_channel(cancel.clone());
//!
//! tokio::spawn(async move {
//!     let mut session = StreamSession::new(SseDialect::chat_completions(), sink);
//!     session.begin();
//!     session.run(response.bytes_stream(), &cancel).await;
//! });
//!
//! let reply = stream.collect_text().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod callbacks;
pub mod channel;
pub mod dialect;
pub mod error;
pub mod framer;
pub mod session;

// Re-exports
pub use callbacks::StreamCallbacks;
pub use channel::{chat_channel, ChatStream, EventSink};
pub use dialect::{
    DeltaPath, Dialect, NdjsonDialect, PatchDialect, SseDialect, StreamEvent, DONE_SENTINEL,
};
pub use error::{StreamError, StreamResult};
pub use framer::{LineFramer, LineStream};
pub use session::{SessionState, StreamSession};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        chat_channel, ChatStream, Dialect, EventSink, StreamCallbacks, StreamEvent, StreamSession,
    };
}
