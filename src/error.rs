use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Non-success status on the initial request.
    #[error("HTTP error! status: {status}")]
    Transport { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The stream broke off before the completion sentinel.
    #[error("stream interrupted: {reason}")]
    Stream { reason: String, partial: String },

    #[error("message is empty")]
    EmptyMessage,

    #[error("conversation has no messages to send")]
    EmptyConversation,

    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ChatError {
    /// Text that was received before a stream error, if any.
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            ChatError::Stream { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }
}
