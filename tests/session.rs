use std::sync::Arc;
use tokamak_chat::client::ChatApiClient;
use tokamak_chat::error::ChatError;
use tokamak_chat::history::{
    self,
    FileHistoryStore,
    HistoryStore,
    MemoryHistoryStore,
    HISTORY_KEY,
};
use tokamak_chat::models::chat::ChatMessage;
use tokamak_chat::session::ChatSession;
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

async fn chat_server(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/event-stream"))
        .mount(&server).await;
    server
}

fn session_for(server: &MockServer, store: Arc<dyn HistoryStore>) -> ChatSession {
    ChatSession::new(ChatApiClient::new(&server.uri()).unwrap(), store, "qwen3-235b")
}

#[tokio::test]
async fn completed_exchange_is_appended_and_persisted() {
    let server = chat_server(200, "data: {\"content\":\"Hi\"}\n\ndata: {\"content\":\" there\"}\n\ndata: [DONE]\n\n").await;
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    let mut session = session_for(&server, store.clone());

    let mut rendered = String::new();
    let answer = session.send("hello", |f| rendered.push_str(f)).await.unwrap();

    assert_eq!(answer, "Hi there");
    assert_eq!(rendered, answer);
    let expected = vec![ChatMessage::user("hello"), ChatMessage::assistant("Hi there")];
    assert_eq!(session.history(), expected.as_slice());
    assert_eq!(history::load_history(store.as_ref()).await.unwrap(), expected);
}

#[tokio::test]
async fn transport_error_appends_no_assistant_message() {
    let server = chat_server(500, "").await;
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    let mut session = session_for(&server, store.clone());

    let err = session.send("hello", |_| {}).await.unwrap_err();
    assert!(matches!(err, ChatError::Transport { status: 500, .. }));
    assert_eq!(session.history(), [ChatMessage::user("hello")].as_slice());
    assert_eq!(history::load_history(store.as_ref()).await.unwrap(), vec![ChatMessage::user("hello")]);
}

#[tokio::test]
async fn interrupted_stream_keeps_partial_reply() {
    let server = chat_server(200, "data: {\"content\":\"par\"}\n\ndata: {\"content\":\"tial\"}\n\n").await;
    let mut session = session_for(&server, Arc::new(MemoryHistoryStore::new()));

    let err = session.send("hello", |_| {}).await.unwrap_err();
    assert!(matches!(err, ChatError::Stream { .. }));
    assert_eq!(session.history().last(), Some(&ChatMessage::assistant("partial")));
}

/// Serves one chunked `data:` line, then holds the connection open without
/// further output until `release` fires.
async fn stalling_server(release: oneshot::Receiver<()>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0u8; 16 * 1024];
        let _ = socket.read(&mut request).await;

        let line = "data: {\"content\":\"half\"}\n\n";
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
            line.len(),
            line
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        let _ = release.await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn cancelled_turn_keeps_partial_reply() {
    let (release_tx, release_rx) = oneshot::channel();
    let url = stalling_server(release_rx).await;
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    let mut session = ChatSession::new(ChatApiClient::new(&url).unwrap(), store.clone(), "m");

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let mut cancel_tx = Some(cancel_tx);
    let mut seen = Vec::new();
    let err = session
        .send_until(
            "hello",
            |fragment| {
                seen.push(fragment.to_string());
                if let Some(tx) = cancel_tx.take() {
                    let _ = tx.send(());
                }
            },
            async {
                let _ = cancel_rx.await;
            }
        ).await
        .unwrap_err();

    assert_eq!(seen, vec!["half"]);
    match err {
        ChatError::Stream { reason, partial } => {
            assert_eq!(reason, "cancelled");
            assert_eq!(partial, "half");
        }
        other => panic!("expected stream error, got {:?}", other),
    }
    let expected = vec![ChatMessage::user("hello"), ChatMessage::assistant("half")];
    assert_eq!(session.history(), expected.as_slice());
    assert_eq!(history::load_history(store.as_ref()).await.unwrap(), expected);
    let _ = release_tx.send(());
}

#[tokio::test]
async fn blank_input_is_rejected_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;
    let mut session = session_for(&server, Arc::new(MemoryHistoryStore::new()));

    assert!(matches!(session.send("   \n", |_| {}).await, Err(ChatError::EmptyMessage)));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn history_round_trips_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(dir.path()));
    let messages: Vec<ChatMessage> = (0..10)
        .map(|i| if i % 2 == 0 { ChatMessage::user(format!("q{}", i)) } else { ChatMessage::assistant(format!("a{}", i)) })
        .collect();

    history::save_history(store.as_ref(), &messages).await.unwrap();
    history::save_selected_model(store.as_ref(), "gpt-4o").await.unwrap();

    let server = MockServer::start().await;
    let restored = ChatSession::restore(ChatApiClient::new(&server.uri()).unwrap(), store, None).await;
    assert_eq!(restored.history(), messages.as_slice());
    assert_eq!(restored.model(), "gpt-4o");
}

#[tokio::test]
async fn corrupt_storage_restores_empty_history() {
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    store.set_item(HISTORY_KEY, "[{\"role\":").await.unwrap();

    let server = MockServer::start().await;
    let restored = ChatSession::restore(ChatApiClient::new(&server.uri()).unwrap(), store, Some("m".into())).await;
    assert!(restored.history().is_empty());
    assert_eq!(restored.model(), "m");
}

#[tokio::test]
async fn resolve_model_prefers_saved_model_when_offered() {
    let server = MockServer::start().await;
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    let mut session = ChatSession::new(ChatApiClient::new(&server.uri()).unwrap(), store.clone(), "b");

    let offered = vec!["a".to_string(), "b".to_string()];
    assert_eq!(session.resolve_model(&offered).await, "b");

    let offered = vec!["x".to_string(), "y".to_string()];
    assert_eq!(session.resolve_model(&offered).await, "x");
    assert_eq!(history::load_selected_model(store.as_ref()).await.unwrap().as_deref(), Some("x"));
}

#[tokio::test]
async fn clear_and_export() {
    let server = chat_server(200, "data: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n").await;
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
    let mut session = session_for(&server, store.clone());

    assert!(session.export_document().is_err());
    session.send("ping", |_| {}).await.unwrap();

    let doc = session.export_document().unwrap();
    assert_eq!(doc.model, "qwen3-235b");
    assert_eq!(doc.messages, session.history());

    let dir = tempfile::tempdir().unwrap();
    let written = tokamak_chat::export::write_document(&doc, dir.path(), chrono::Utc::now()).await.unwrap();
    let reread: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
    assert_eq!(reread["messages"][1]["content"], "ok");

    session.clear().await;
    assert!(session.history().is_empty());
    assert!(history::load_history(store.as_ref()).await.unwrap().is_empty());
}
