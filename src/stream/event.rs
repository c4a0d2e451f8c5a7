use serde::Deserialize;

pub const EVENT_MARKER: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Classification of one complete line of the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Fragment(String),
    Done,
    /// Framed payload that parsed but carried no text.
    Empty,
    /// Framed payload that is not valid JSON.
    Malformed(String),
    /// Blank separator or `:` comment line.
    KeepAlive,
    /// Line without the event marker.
    Unframed(String),
}

#[derive(Deserialize)]
struct FragmentPayload {
    content: Option<String>,
}

pub fn parse_line(line: &str) -> StreamEvent {
    if line.is_empty() || line.starts_with(':') {
        return StreamEvent::KeepAlive;
    }

    let Some(payload) = line.strip_prefix(EVENT_MARKER) else {
        return StreamEvent::Unframed(line.to_string());
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<FragmentPayload>(payload) {
        Ok(FragmentPayload { content: Some(text) }) if !text.is_empty() => StreamEvent::Fragment(text),
        Ok(_) => StreamEvent::Empty,
        Err(_) => StreamEvent::Malformed(payload.to_string()),
    }
}
