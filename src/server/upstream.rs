use futures::{ Stream, StreamExt };
use log::{ debug, error, info };
use reqwest::{ Client as HttpClient, header::AUTHORIZATION };
use serde::{ Deserialize, Serialize };
use std::collections::BTreeSet;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::RelayConfig;
use crate::error::BoxError;
use crate::models::chat::ChatMessage;
use crate::stream::{ LineBuffer, DONE_SENTINEL };

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIModelList {
    data: Vec<OpenAIModel>,
}

#[derive(Deserialize)]
struct OpenAIModel {
    id: String,
}

/// Sends the deltas of one upstream line. Returns `false` once the stream is
/// finished or the receiver is gone.
async fn forward_line(line: &str, tx: &mpsc::Sender<Result<String, BoxError>>) -> bool {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return true;
    };
    if data == DONE_SENTINEL {
        return false;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(stream_resp) => {
            for choice in stream_resp.choices {
                if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                    if tx.send(Ok(content)).await.is_err() {
                        return false;
                    }
                }
            }
        }
        Err(e) => {
            debug!("Upstream JSON parse error: {} for data: {}", e, data);
        }
    }
    true
}

/// Client for the OpenAI-compatible API behind the relay.
#[derive(Clone)]
pub struct UpstreamClient {
    http: HttpClient,
    config: RelayConfig,
}

impl UpstreamClient {
    pub fn new(config: RelayConfig) -> Self {
        Self { http: HttpClient::new(), config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Streams the content deltas of one chat completion.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage]
    ) -> Result<DeltaStream, BoxError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let key = self.config.key_for_model(model);
        let req = OpenAIChatRequest { model, messages, stream: true };

        let resp = self.http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", key))
            .json(&req)
            .send().await?
            .error_for_status()?;
        info!("Upstream stream opened for model {}", model);

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = resp.bytes_stream();

        tokio::spawn(async move {
            let mut lines = LineBuffer::new();
            while let Some(chunk_result) = bytes.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as BoxError)).await;
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    if !forward_line(&line, &tx).await {
                        return;
                    }
                }
            }
            if let Some(tail) = lines.finish() {
                forward_line(&tail, &tx).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Union of the models visible to every configured key, sorted.
    /// Falls back to the configured default list when nothing could be listed.
    pub async fn list_models(&self) -> Vec<String> {
        let url = format!("{}/models", self.config.base_url);
        let mut all_models = BTreeSet::new();

        for key in self.config.all_keys() {
            match self.fetch_models(&url, key).await {
                Ok(models) => all_models.extend(models),
                Err(e) => {
                    let shown: String = key.chars().take(10).collect();
                    error!("Error fetching models for key {}...: {}", shown, e);
                }
            }
        }

        if all_models.is_empty() {
            return self.config.default_models.clone();
        }
        all_models.into_iter().collect()
    }

    async fn fetch_models(&self, url: &str, key: &str) -> Result<Vec<String>, BoxError> {
        let list = self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", key))
            .send().await?
            .error_for_status()?
            .json::<OpenAIModelList>().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}
