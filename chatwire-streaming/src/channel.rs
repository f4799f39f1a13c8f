//! The channel between a streaming task and its caller.
//!
//! The producer side is an [`EventSink`], owned by the task reading the
//! response body. The consumer side is a [`ChatStream`]. The sink enforces the
//! terminal-event contract: after `Done` or `Error`, everything is dropped.

use crate::callbacks::StreamCallbacks;
use chatwire_core::{ChatEvent, GatewayError, GatewayResult};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Create a connected sink and stream.
///
/// `cancel` is cancelled when the stream is dropped or
/// [`cancel`](ChatStream::cancel)led, which is how the producer learns the
/// caller went away.
pub fn chat_channel(cancel: CancellationToken) -> (EventSink, ChatStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = EventSink {
        tx,
        finished: Arc::new(AtomicBool::new(false)),
    };
    let stream = ChatStream {
        rx,
        cancel,
        terminated: false,
    };
    (sink, stream)
}

/// Producer half of a chat channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChatEvent>,
    finished: Arc<AtomicBool>,
}

impl EventSink {
    /// Send an event.
    ///
    /// Returns `false` if the event was dropped, either because a terminal
    /// event was already sent or because the consumer is gone.
    pub fn send(&self, event: ChatEvent) -> bool {
        if event.is_terminal() {
            if self.finished.swap(true, Ordering::AcqRel) {
                return false;
            }
        } else if self.finished.load(Ordering::Acquire) {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Send reply text.
    pub fn content(&self, text: impl Into<String>) -> bool {
        self.send(ChatEvent::Content(text.into()))
    }

    /// Send reasoning text.
    pub fn thinking(&self, text: impl Into<String>) -> bool {
        self.send(ChatEvent::Thinking(text.into()))
    }

    /// End the stream normally.
    pub fn done(&self) -> bool {
        self.send(ChatEvent::Done)
    }

    /// End the stream with an error.
    pub fn error(&self, error: GatewayError) -> bool {
        self.send(ChatEvent::Error(error))
    }

    /// Whether a terminal event has been sent.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether the consumer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a chat channel.
///
/// Yields events until exactly one terminal event, then ends. If the producer
/// disappears without finishing, a synthetic [`GatewayError::Stream`] error is
/// yielded so consumers always observe a terminal event.
#[derive(Debug)]
pub struct ChatStream {
    rx: mpsc::UnboundedReceiver<ChatEvent>,
    cancel: CancellationToken,
    terminated: bool,
}

impl ChatStream {
    /// Abort the request. The stream then ends with
    /// [`GatewayError::Cancelled`] unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token cancelled when this stream is dropped.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Consume the stream and return the concatenated reply text.
    pub async fn collect_text(mut self) -> GatewayResult<String> {
        let mut text = String::new();
        while let Some(event) = self.next().await {
            match event {
                ChatEvent::Content(chunk) => text.push_str(&chunk),
                ChatEvent::Done => return Ok(text),
                ChatEvent::Error(error) => return Err(error),
                ChatEvent::Thinking(_) | ChatEvent::Metadata(_) => {}
            }
        }
        Ok(text)
    }

    /// Consume the stream, dispatching every event to `callbacks`.
    pub async fn drive<C>(mut self, callbacks: &mut C)
    where
        C: StreamCallbacks + ?Sized,
    {
        while let Some(event) = self.next().await {
            match event {
                ChatEvent::Content(text) => callbacks.on_content(&text),
                ChatEvent::Thinking(text) => callbacks.on_thinking(&text),
                ChatEvent::Metadata(metadata) => callbacks.on_metadata(&metadata),
                ChatEvent::Done => callbacks.on_done(),
                ChatEvent::Error(error) => callbacks.on_error(&error),
            }
        }
    }
}

impl Stream for ChatStream {
    type Item = ChatEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.terminated {
            return Poll::Ready(None);
        }

        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.terminated = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.terminated = true;
                Poll::Ready(Some(ChatEvent::Error(GatewayError::Stream(
                    "stream ended without a terminal event".into(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
