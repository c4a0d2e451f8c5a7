//! Line framing for chunked `text/event-stream` bodies.
//!
//! Network reads hand us arbitrary byte chunks. A line (or a multi-byte
//! character) may be split across any number of them, so bytes are held
//! back until a `\n` arrives and only complete lines are decoded.

pub mod event;

pub use event::{ parse_line, StreamEvent, DONE_SENTINEL, EVENT_MARKER };

/// Splits `pending ++ chunk` on `\n`.
///
/// Returns the complete lines (without the terminator and without a trailing
/// `\r`) and the unterminated remainder to carry into the next call.
pub fn split_lines(pending: &[u8], chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut buf = Vec::with_capacity(pending.len() + chunk.len());
    buf.extend_from_slice(pending);
    buf.extend_from_slice(chunk);

    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') {
        let end = start + offset;
        lines.push(decode_line(&buf[start..end]));
        start = end + 1;
    }

    (lines, buf.split_off(start))
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Stateful wrapper over [`split_lines`] used by the stream consumers.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let (lines, remainder) = split_lines(&self.pending, chunk);
        self.pending = remainder;
        lines
    }

    /// Bytes received after the last newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Flushes the unterminated tail once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.pending);
        Some(decode_line(&tail))
    }
}
