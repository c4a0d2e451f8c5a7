use chrono::{ DateTime, SecondsFormat, Utc };
use log::info;
use std::path::{ Path, PathBuf };
use thiserror::Error;

use crate::models::chat::{ ChatMessage, ExportDocument };

pub const EXPORT_PREFIX: &str = "tokamak-ai-chat";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("there is no conversation to save")]
    EmptyConversation,
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize export: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn build_document(
    messages: &[ChatMessage],
    model: &str,
    now: DateTime<Utc>
) -> Result<ExportDocument, ExportError> {
    if messages.is_empty() {
        return Err(ExportError::EmptyConversation);
    }
    Ok(ExportDocument {
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        model: model.to_string(),
        messages: messages.to_vec(),
    })
}

/// `tokamak-ai-chat-2026-10-19T08-30-00-000Z.json`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true).replace([':', '.'], "-");
    format!("{}-{}.json", EXPORT_PREFIX, stamp)
}

pub async fn write_document(
    document: &ExportDocument,
    dir: &Path,
    now: DateTime<Utc>
) -> Result<PathBuf, ExportError> {
    let json = serde_json::to_string_pretty(document)?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(export_file_name(now));
    tokio::fs::write(&path, json).await?;
    info!("Exported {} message(s) to {}", document.messages.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 5).unwrap()
    }

    #[test]
    fn empty_history_cannot_be_exported() {
        assert!(matches!(build_document(&[], "m", fixed_now()), Err(ExportError::EmptyConversation)));
    }

    #[test]
    fn file_name_has_no_colons_or_dots_in_stamp() {
        assert_eq!(export_file_name(fixed_now()), "tokamak-ai-chat-2026-10-19T08-30-05-000Z.json");
    }

    #[test]
    fn document_carries_model_and_messages() {
        let messages = vec![ChatMessage::user("hello"), ChatMessage::assistant("Hi there")];
        let doc = build_document(&messages, "qwen3-235b", fixed_now()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["timestamp"], "2026-10-19T08:30:05.000Z");
        assert_eq!(json["model"], "qwen3-235b");
        assert_eq!(json["messages"][1]["content"], "Hi there");
    }
}
