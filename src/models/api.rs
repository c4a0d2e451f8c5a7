use serde::{ Deserialize, Serialize };

use super::chat::ChatMessage;

/// Body of `POST /api/chat`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// One `data:` payload of the chat stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}
