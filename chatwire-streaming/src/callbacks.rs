//! Callback-style consumption of a chat stream.

use chatwire_core::{GatewayError, Metadata};

/// Receives the events of one chat stream.
///
/// Exactly one of [`on_done`](Self::on_done) or [`on_error`](Self::on_error)
/// is called, once, after every other callback.
pub trait StreamCallbacks {
    /// A piece of the reply.
    fn on_content(&mut self, text: &str);

    /// A piece of reasoning output.
    fn on_thinking(&mut self, _text: &str) {}

    /// Title, conversation id, usage and similar.
    fn on_metadata(&mut self, _metadata: &Metadata) {}

    /// The reply finished normally.
    fn on_done(&mut self);

    /// The reply failed.
    fn on_error(&mut self, error: &GatewayError);
}
