use chrono::Utc;
use log::{ error, info, warn };
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::client::ChatApiClient;
use crate::error::ChatError;
use crate::export::{ self, ExportError };
use crate::history::{ self, HistoryStore };
use crate::models::chat::{ ChatMessage, ExportDocument };

/// One conversation: its history, the selected model and where both persist.
///
/// Every mutating operation takes `&mut self`, so at most one chat turn can
/// be in flight per session.
pub struct ChatSession {
    id: String,
    client: ChatApiClient,
    store: Arc<dyn HistoryStore>,
    history: Vec<ChatMessage>,
    model: String,
}

impl ChatSession {
    pub fn new(client: ChatApiClient, store: Arc<dyn HistoryStore>, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client,
            store,
            history: Vec::new(),
            model: model.into(),
        }
    }

    /// Rebuilds a session from storage. Load failures yield an empty history.
    pub async fn restore(
        client: ChatApiClient,
        store: Arc<dyn HistoryStore>,
        model_override: Option<String>
    ) -> Self {
        let history = history::load_history_or_empty(store.as_ref()).await;
        let saved_model = match history::load_selected_model(store.as_ref()).await {
            Ok(model) => model,
            Err(e) => {
                warn!("Failed to load selected model: {}", e);
                None
            }
        };
        let model = model_override.or(saved_model).unwrap_or_default();

        let mut session = Self::new(client, store, model);
        session.history = history;
        info!(
            "Session {} restored with {} message(s), model '{}'",
            session.id,
            session.history.len(),
            session.model
        );
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn client(&self) -> &ChatApiClient {
        &self.client
    }

    pub async fn select_model(&mut self, model: &str) {
        self.model = model.to_string();
        if let Err(e) = history::save_selected_model(self.store.as_ref(), model).await {
            error!("Failed to save selected model: {}", e);
        }
    }

    /// Keeps the current model if the server offers it, otherwise picks the
    /// first available one. Returns the model in effect.
    pub async fn resolve_model(&mut self, available: &[String]) -> &str {
        if !self.model.is_empty() && available.iter().any(|m| m == &self.model) {
            return &self.model;
        }
        if let Some(first) = available.first().cloned() {
            if !self.model.is_empty() {
                warn!("Model '{}' is not offered by the server, using '{}'", self.model, first);
            }
            self.select_model(&first).await;
        }
        &self.model
    }

    /// Sends one user message and streams the reply into `on_fragment`.
    pub async fn send<F>(&mut self, content: &str, on_fragment: F) -> Result<String, ChatError>
        where F: FnMut(&str)
    {
        self.send_until(content, on_fragment, std::future::pending::<()>()).await
    }

    /// Like [`ChatSession::send`], but abandons the stream when `cancel`
    /// resolves. A cancelled turn keeps its partial reply.
    pub async fn send_until<F, C>(
        &mut self,
        content: &str,
        mut on_fragment: F,
        cancel: C
    ) -> Result<String, ChatError>
        where F: FnMut(&str), C: Future<Output = ()>
    {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        self.history.push(ChatMessage::user(content));
        self.persist().await;

        let mut stream = self.client.stream_chat(&self.history, &self.model).await?;

        tokio::pin!(cancel);
        let outcome = loop {
            tokio::select! {
                next = stream.next_fragment() => {
                    match next {
                        Ok(Some(fragment)) => on_fragment(&fragment),
                        Ok(None) => break Ok(stream.into_text()),
                        Err(e) => break Err(e),
                    }
                }
                _ = &mut cancel => {
                    info!("Session {}: stream cancelled by user", self.id);
                    break Err(stream.interrupt("cancelled"));
                }
            }
        };

        match outcome {
            Ok(text) => {
                self.history.push(ChatMessage::assistant(text.clone()));
                self.persist().await;
                Ok(text)
            }
            Err(e) => {
                if let Some(partial) = e.partial_text() {
                    self.history.push(ChatMessage::assistant(partial));
                    self.persist().await;
                }
                Err(e)
            }
        }
    }

    pub async fn clear(&mut self) {
        self.history.clear();
        self.persist().await;
    }

    /// Clears history and forgets the selected model.
    pub async fn reset(&mut self) {
        self.clear().await;
        if let Err(e) = self.store.remove_item(history::MODEL_KEY).await {
            error!("Failed to remove selected model: {}", e);
        }
    }

    pub fn export_document(&self) -> Result<ExportDocument, ExportError> {
        export::build_document(&self.history, &self.model, Utc::now())
    }

    async fn persist(&self) {
        if let Err(e) = history::save_history(self.store.as_ref(), &self.history).await {
            error!("Failed to save conversation history: {}", e);
        }
    }
}
