mod file;
mod memory;

use async_trait::async_trait;
use log::{ info, warn };
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use crate::models::chat::ChatMessage;

pub use self::file::FileHistoryStore;
pub use self::memory::MemoryHistoryStore;

pub const HISTORY_KEY: &str = "conversationHistory";
pub const MODEL_KEY: &str = "selectedModel";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported history store type: {0}")]
    UnsupportedType(String),
}

/// String key/value storage, the local equivalent of browser storage.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

pub fn create_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, StoreError> {
    match args.history_type.to_lowercase().as_str() {
        "file" => Ok(Arc::new(FileHistoryStore::new(&args.history_dir))),
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        other => Err(StoreError::UnsupportedType(other.to_string())),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<Arc<dyn HistoryStore>, StoreError> {
    info!("Chat history will be stored in: {} at {}", args.history_type, args.history_dir.display());
    create_history_store(args)
}

pub async fn load_history(store: &dyn HistoryStore) -> Result<Vec<ChatMessage>, StoreError> {
    match store.get_item(HISTORY_KEY).await? {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

pub async fn save_history(
    store: &dyn HistoryStore,
    messages: &[ChatMessage]
) -> Result<(), StoreError> {
    let json = serde_json::to_string(messages)?;
    store.set_item(HISTORY_KEY, &json).await
}

/// The model key holds a bare string, not a JSON document.
pub async fn load_selected_model(store: &dyn HistoryStore) -> Result<Option<String>, StoreError> {
    Ok(store.get_item(MODEL_KEY).await?.filter(|m| !m.trim().is_empty()))
}

pub async fn save_selected_model(store: &dyn HistoryStore, model: &str) -> Result<(), StoreError> {
    store.set_item(MODEL_KEY, model).await
}

/// Loads history, falling back to an empty conversation on any failure.
pub async fn load_history_or_empty(store: &dyn HistoryStore) -> Vec<ChatMessage> {
    match load_history(store).await {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Failed to load conversation history: {}", e);
            Vec::new()
        }
    }
}

pub fn format_history_for_display(messages: &[ChatMessage]) -> String {
    let mut result = String::new();
    for msg in messages {
        let role_display = match msg.role {
            crate::models::chat::Role::User => "You",
            crate::models::chat::Role::Assistant => "AI",
        };
        result.push_str(&format!("{}: {}\n", role_display, msg.content));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_preserves_order() {
        let store = MemoryHistoryStore::new();
        let messages: Vec<ChatMessage> = (0..7)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("question {}", i))
                } else {
                    ChatMessage::assistant(format!("answer {}", i))
                }
            })
            .collect();

        save_history(&store, &messages).await.unwrap();
        assert_eq!(load_history(&store).await.unwrap(), messages);
    }

    #[tokio::test]
    async fn missing_history_is_empty() {
        let store = MemoryHistoryStore::new();
        assert!(load_history(&store).await.unwrap().is_empty());
        assert_eq!(load_selected_model(&store).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_history_falls_back_to_empty() {
        let store = MemoryHistoryStore::new();
        store.set_item(HISTORY_KEY, "{not json").await.unwrap();
        assert!(load_history(&store).await.is_err());
        assert!(load_history_or_empty(&store).await.is_empty());
    }

    #[tokio::test]
    async fn selected_model_is_kept_separately() {
        let store = MemoryHistoryStore::new();
        save_selected_model(&store, "qwen3-235b").await.unwrap();
        save_history(&store, &[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(load_selected_model(&store).await.unwrap().as_deref(), Some("qwen3-235b"));
    }

    #[test]
    fn display_format() {
        let text = format_history_for_display(&[ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
        assert_eq!(text, "You: hi\nAI: hello\n");
    }
}
