use bytes::Bytes;
use futures::{ Stream, StreamExt };
use log::{ debug, trace };
use std::collections::VecDeque;
use std::pin::Pin;

use crate::error::{ BoxError, ChatError };
use crate::stream::{ parse_line, LineBuffer, StreamEvent };

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    /// Body ended; only buffered lines remain.
    Draining,
    Completed,
    Failed,
}

/// Incremental consumer of one chat response body.
///
/// Fragments are pulled with [`ChatStream::next_fragment`] and appended to an
/// internal accumulator. `Ok(None)` means the completion sentinel arrived and
/// [`ChatStream::text`] holds the finished assistant message.
pub struct ChatStream {
    body: ByteStream,
    lines: LineBuffer,
    queued: VecDeque<String>,
    accumulated: String,
    state: State,
}

impl ChatStream {
    pub fn new(body: ByteStream) -> Self {
        Self {
            body,
            lines: LineBuffer::new(),
            queued: VecDeque::new(),
            accumulated: String::new(),
            state: State::Open,
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        let body = response.bytes_stream().map(|chunk| chunk.map_err(|e| Box::new(e) as BoxError));
        Self::new(Box::pin(body))
    }

    pub fn text(&self) -> &str {
        &self.accumulated
    }

    pub fn into_text(self) -> String {
        self.accumulated
    }

    pub fn is_completed(&self) -> bool {
        self.state == State::Completed
    }

    /// Abandons the stream, keeping whatever text already arrived.
    pub fn interrupt(&mut self, reason: impl Into<String>) -> ChatError {
        self.state = State::Failed;
        self.queued.clear();
        self.stream_error(reason)
    }

    pub async fn next_fragment(&mut self) -> Result<Option<String>, ChatError> {
        loop {
            match self.state {
                State::Completed => {
                    return Ok(None);
                }
                State::Failed => {
                    return Err(self.stream_error("stream already terminated"));
                }
                State::Open | State::Draining => {}
            }

            while let Some(line) = self.queued.pop_front() {
                match parse_line(&line) {
                    StreamEvent::Fragment(text) => {
                        self.accumulated.push_str(&text);
                        return Ok(Some(text));
                    }
                    StreamEvent::Done => {
                        self.state = State::Completed;
                        self.queued.clear();
                        return Ok(None);
                    }
                    StreamEvent::Malformed(payload) => {
                        debug!("Skipping malformed stream payload: {}", payload);
                    }
                    StreamEvent::Unframed(raw) => {
                        debug!("Dropping unframed stream line: {}", raw);
                    }
                    StreamEvent::KeepAlive | StreamEvent::Empty => {
                        trace!("Ignoring stream line without text");
                    }
                }
            }

            if self.state == State::Draining {
                self.state = State::Failed;
                return Err(self.stream_error("connection closed before completion"));
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    self.queued.extend(self.lines.push(&chunk));
                }
                Some(Err(e)) => {
                    self.state = State::Failed;
                    return Err(self.stream_error(e.to_string()));
                }
                None => {
                    self.state = State::Draining;
                    if let Some(tail) = self.lines.finish() {
                        self.queued.push_back(tail);
                    }
                }
            }
        }
    }

    /// Drives the stream to completion, handing each fragment to `on_fragment`.
    pub async fn collect_with<F>(mut self, mut on_fragment: F) -> Result<String, ChatError>
        where F: FnMut(&str)
    {
        while let Some(fragment) = self.next_fragment().await? {
            on_fragment(&fragment);
        }
        Ok(self.into_text())
    }

    fn stream_error(&self, reason: impl Into<String>) -> ChatError {
        ChatError::Stream {
            reason: reason.into(),
            partial: self.accumulated.clone(),
        }
    }
}
