//! Per-request stream session.
//!
//! A session owns the producer side of a chat channel and drives it through
//! `Idle -> Requesting -> Streaming -> (Done | Error)`. Terminal states are
//! final: once reached, nothing further is emitted.

use crate::channel::EventSink;
use crate::dialect::{Dialect, StreamEvent};
use crate::framer::LineStream;
use bytes::Bytes;
use chatwire_core::GatewayError;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing sent yet.
    Idle,
    /// Request dispatched, waiting for response headers.
    Requesting,
    /// Reading the response body.
    Streaming,
    /// Finished normally.
    Done,
    /// Finished with an error.
    Error,
}

impl SessionState {
    /// Whether the session has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Error)
    }
}

/// Turns a response body into canonical events using a [`Dialect`].
#[derive(Debug)]
pub struct StreamSession<D> {
    dialect: D,
    sink: EventSink,
    state: SessionState,
}

impl<D: Dialect> StreamSession<D> {
    /// Create an idle session.
    pub fn new(dialect: D, sink: EventSink) -> Self {
        Self {
            dialect,
            sink,
            state: SessionState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Mark the request as dispatched.
    pub fn begin(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Requesting;
        }
    }

    /// Finish with an error. No-op once terminal.
    pub fn fail(&mut self, error: GatewayError) {
        if self.state.is_terminal() {
            return;
        }
        debug!(dialect = self.dialect.name(), error = %error, "Stream session failed");
        self.sink.error(error);
        self.state = SessionState::Error;
    }

    /// Finish normally. No-op once terminal.
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.sink.done();
        self.state = SessionState::Done;
    }

    /// Read `body` to completion, emitting events as lines arrive.
    ///
    /// Ends with `Done` on the dialect's sentinel or end of body, and with an
    /// error on a transport failure, an in-stream error or cancellation.
    pub async fn run<S, E>(&mut self, body: S, cancel: &CancellationToken) -> SessionState
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = SessionState::Streaming;

        let lines = LineStream::new(body);
        tokio::pin!(lines);

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.fail(GatewayError::Cancelled);
                    break;
                }
                next = lines.next() => next,
            };

            match next {
                Some(Ok(line)) => {
                    if self.handle_line(&line) {
                        break;
                    }
                }
                Some(Err(e)) => {
                    self.fail(e.into());
                    break;
                }
                None => {
                    self.finish();
                    break;
                }
            }
        }

        self.state
    }

    /// Classify and forward one line. Returns `true` once the session is
    /// terminal.
    fn handle_line(&mut self, line: &str) -> bool {
        for event in self.dialect.classify(line) {
            match event {
                StreamEvent::Ignore => {}
                StreamEvent::Done => {
                    self.finish();
                    return true;
                }
                StreamEvent::Error(message) => {
                    self.fail(GatewayError::backend(message));
                    return true;
                }
                other => {
                    let Some(event) = other.into_chat_event() else {
                        continue;
                    };
                    if !self.sink.send(event) {
                        trace!(dialect = self.dialect.name(), "Consumer gone, stopping session");
                        self.state = SessionState::Error;
                        return true;
                    }
                }
            }
        }
        false
    }
}
