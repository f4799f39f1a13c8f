//! Line framing for chunked response bodies.
//!
//! Network chunks split lines at arbitrary byte offsets. [`LineFramer`] keeps
//! the unterminated tail of each chunk and only ever hands out complete lines,
//! so a dialect never sees half a frame.

use crate::error::{StreamError, StreamResult};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

const MAX_LINE_SIZE: usize = 10 * 1024 * 1024;

/// Splits a byte stream into `\n`-terminated lines.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            max_line: MAX_LINE_SIZE,
        }
    }
}

impl LineFramer {
    /// Create a new framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a framer with a custom limit on unterminated data.
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Feed a chunk and return every line it completes.
    ///
    /// Lines are returned without the trailing `\n` (or `\r\n`).
    pub fn feed(&mut self, chunk: &[u8]) -> StreamResult<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            return Err(StreamError::BufferOverflow(self.max_line));
        }

        Ok(lines)
    }

    /// Call when the stream ends to flush the residual line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let residual = std::mem::take(&mut self.buffer);
        let line = decode_line(&residual);
        if line.is_empty() {
            None
        } else {
            Some(line)
        }
    }

    /// Number of buffered bytes not yet terminated by a newline.
    #[must_use]
    pub fn residual_len(&self) -> usize {
        self.buffer.len()
    }
}

// Splitting on the `\n` byte never cuts a multi-byte UTF-8 sequence, so a
// lossy decode only replaces bytes that were invalid upstream.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

pin_project! {
    /// Stream adapter that turns a byte stream into complete lines.
    pub struct LineStream<S> {
        #[pin]
        inner: S,
        framer: LineFramer,
        pending: VecDeque<String>,
        finished: bool,
    }
}

impl<S> LineStream<S> {
    /// Wrap a byte stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            framer: LineFramer::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for LineStream<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    type Item = StreamResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => match this.framer.feed(&bytes) {
                    Ok(lines) => this.pending.extend(lines),
                    Err(error) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(StreamError::transport(e))));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    if let Some(line) = this.framer.finish() {
                        this.pending.push_back(line);
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
