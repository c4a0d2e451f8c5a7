pub mod stream;

use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, ACCEPT } };
use serde_json::Value as JsonValue;

use crate::error::ChatError;
use crate::models::api::{ ChatRequest, ModelList };
use crate::models::chat::ChatMessage;

pub use self::stream::{ ByteStream, ChatStream };

/// HTTP client for the chat server's `/api` endpoints.
#[derive(Clone, Debug)]
pub struct ChatApiClient {
    http: HttpClient,
    base_url: String,
}

impl ChatApiClient {
    pub fn new(server_url: &str) -> Result<Self, ChatError> {
        let base_url = server_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ChatError::InvalidUrl {
                url: server_url.to_string(),
                reason: "expected an http:// or https:// url".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/event-stream"));
        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/api/{}", self.base_url, route)
    }

    /// Starts one chat turn. The returned stream must be driven to obtain text.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model: &str
    ) -> Result<ChatStream, ChatError> {
        if messages.is_empty() {
            return Err(ChatError::EmptyConversation);
        }

        let request = ChatRequest {
            messages: messages.to_vec(),
            model: Some(model.trim().to_string()).filter(|m| !m.is_empty()),
        };
        info!("Sending {} message(s) to {} (model: {})", messages.len(), self.base_url, model);

        let response = self.http.post(self.endpoint("chat")).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport { status: status.as_u16(), body });
        }

        debug!("Chat stream opened with status {}", status);
        Ok(ChatStream::from_response(response))
    }

    pub async fn list_models(&self) -> Result<Vec<String>, ChatError> {
        let response = self.http.get(self.endpoint("models")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport { status: status.as_u16(), body });
        }
        let list = response.json::<ModelList>().await?;
        Ok(list.models)
    }

    /// Advisory only; the payload is not interpreted.
    pub async fn health(&self) -> Result<JsonValue, ChatError> {
        let response = self.http.get(self.endpoint("health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Transport { status: status.as_u16(), body });
        }
        Ok(response.json::<JsonValue>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ChatApiClient::new("http://localhost:5000/").unwrap();
        assert_eq!(client.endpoint("chat"), "http://localhost:5000/api/chat");
    }

    #[test]
    fn non_http_url_is_rejected() {
        assert!(matches!(ChatApiClient::new("localhost:5000"), Err(ChatError::InvalidUrl { .. })));
    }
}
