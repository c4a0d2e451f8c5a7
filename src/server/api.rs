use axum::{
    Json,
    Router,
    extract::State,
    http::{ header, HeaderName },
    response::{ IntoResponse, sse::{ Event, KeepAlive, Sse } },
    routing::{ get, post },
};
use chrono::Local;
use futures::StreamExt;
use log::{ error, info };
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{ Any, CorsLayer };

use super::upstream::UpstreamClient;
use crate::models::api::{ ChatRequest, HealthStatus, ModelList, StreamChunk };
use crate::stream::DONE_SENTINEL;

#[derive(Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/models", get(models_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

fn content_event(content: String) -> Event {
    let chunk = StreamChunk { content };
    match serde_json::to_string(&chunk) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            error!("Failed to encode stream chunk: {}", e);
            Event::default().comment("encode error")
        }
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> impl IntoResponse {
    let model = req.model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.upstream.config().fallback_model.clone());
    info!("Chat request: {} message(s), model {}", req.messages.len(), model);

    let (tx, rx) = mpsc::channel::<Event>(32);
    let upstream = state.upstream.clone();
    let messages = req.messages;

    tokio::spawn(async move {
        match upstream.chat_stream(&model, &messages).await {
            Ok(mut deltas) => {
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(text) => {
                            if tx.send(content_event(text)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            error!("Upstream stream error ({}): {}", model, e);
                            let _ = tx.send(content_event(format!("\n\n❌ Error ({}): {}", model, e))).await;
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Upstream request failed ({}): {}", model, e);
                let _ = tx.send(content_event(format!("\n\n❌ Error ({}): {}", model, e))).await;
            }
        }
        let _ = tx.send(Event::default().data(DONE_SENTINEL)).await;
    });

    let events = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
}

async fn models_handler(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList { models: state.upstream.list_models().await })
}

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: Local::now().to_rfc3339(),
    })
}
