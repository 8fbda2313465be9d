use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use notegen::api::state::AppState;
use notegen::config::Config;
use notegen::engine::JobId;
use notegen::generation::{
    ChatRequest, GeneratedImage, GenerationError, GenerationService, ImageOptions,
};
use notegen::humanize::HumanDuration;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Fails on FAIL, stalls on SLOW, panics on PANIC
struct ScriptedGenerator;

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn complete(&self, _request: ChatRequest) -> Result<String, GenerationError> {
        Ok(r#"{"cover": "A title", "contents": ["one", "two"]}"#.to_string())
    }

    async fn generate_image(
        &self,
        prompt: &str,
        _options: &ImageOptions,
    ) -> Result<Vec<GeneratedImage>, GenerationError> {
        if prompt.contains("PANIC") {
            panic!("generator bug");
        }
        if prompt.contains("SLOW") {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        if prompt.contains("FAIL") {
            return Err(GenerationError::Timeout);
        }
        Ok(vec![GeneratedImage {
            url: Some("https://images.test/a.png".to_string()),
            b64_json: None,
        }])
    }
}

async fn start_server() -> (String, AppState) {
    let mut config = Config::default();
    config.engine.inter_item_delay = HumanDuration::from_millis(0);
    let state = AppState::new(config, Arc::new(ScriptedGenerator));
    let app = notegen::api::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/ws", addr), state)
}

async fn connect(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("WebSocket handshake failed");
    socket
}

async fn send(socket: &mut Socket, message: Value) {
    socket
        .send(Message::Text(message.to_string().into()))
        .await
        .unwrap();
}

async fn next_message(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a message")
            .expect("socket closed")
            .unwrap();

        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Read until the given event arrives, returning it and everything before it
async fn collect_until(socket: &mut Socket, event: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    loop {
        let message = next_message(socket).await;
        let done = message["event"] == event;
        messages.push(message);
        if done {
            return messages;
        }
    }
}

fn progress(messages: &[Value]) -> Vec<&Value> {
    messages
        .iter()
        .filter(|m| m["event"] == "progress")
        .map(|m| &m["data"])
        .collect()
}

#[tokio::test]
async fn test_generate_images_streams_progress_then_results() {
    let (url, _state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({
            "event": "generate-images",
            "data": { "taskId": "ws-1", "segments": ["cover", "FAIL middle", "end"] }
        }),
    )
    .await;

    let messages = collect_until(&mut socket, "images-generated").await;

    let events = progress(&messages);
    let counts: Vec<u64> = events
        .iter()
        .map(|e| e["completedCount"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, vec![0, 1, 2, 3, 3]);
    assert!(events.iter().all(|e| e["jobId"] == "ws-1"));
    assert_eq!(events.last().unwrap()["phase"], "completed");

    let result = &messages.last().unwrap()["data"];
    assert_eq!(result["taskId"], "ws-1");
    assert_eq!(result["success"], true);
    assert_eq!(result["succeeded"], 2);
    assert_eq!(result["failed"], 1);
    assert_eq!(result["results"][1]["outcome"], "failure");
    assert_eq!(result["results"][1]["reason"], "Generation request timed out");
}

#[tokio::test]
async fn test_segment_text_over_socket() {
    let (url, _state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({ "event": "segment-text", "data": { "taskId": "seg-1", "text": "long enough text to split" } }),
    )
    .await;

    let messages = collect_until(&mut socket, "text-segmented").await;
    let result = &messages.last().unwrap()["data"];

    assert_eq!(result["success"], true);
    assert_eq!(result["segments"], json!(["A title", "one", "two"]));
    assert_eq!(result["segmentTypes"], json!(["cover", "content", "content"]));
}

#[tokio::test]
async fn test_cancel_task_stops_at_next_item() {
    let (url, _state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({
            "event": "generate-images",
            "data": { "taskId": "ws-cancel", "segments": ["SLOW first", "second", "third"] }
        }),
    )
    .await;

    // First item is in flight once preparing arrives
    let first = next_message(&mut socket).await;
    assert_eq!(first["data"]["phase"], "preparing");

    send(
        &mut socket,
        json!({ "event": "cancel-task", "data": { "taskId": "ws-cancel" } }),
    )
    .await;

    let messages = collect_until(&mut socket, "images-generated").await;

    let acks: Vec<_> = messages
        .iter()
        .filter(|m| m["event"] == "task-cancelled")
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["data"]["taskId"], "ws-cancel");

    let terminal = *progress(&messages).last().unwrap();
    assert_eq!(terminal["phase"], "cancelled");
    assert_eq!(terminal["completedCount"], 1);

    let result = &messages.last().unwrap()["data"];
    assert_eq!(result["success"], false);
    assert_eq!(result["phase"], "cancelled");
    assert_eq!(result["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_unknown_task_is_silent() {
    let (url, _state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({ "event": "cancel-task", "data": { "taskId": "nobody" } }),
    )
    .await;
    // Anything sent afterwards must be the next reply
    send(&mut socket, json!({ "event": "bogus", "data": {} })).await;

    let reply = next_message(&mut socket).await;
    assert_eq!(reply["event"], "error");
}

#[tokio::test]
async fn test_crashed_job_reports_failed_phase() {
    let (url, state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({
            "event": "generate-images",
            "data": { "taskId": "ws-crash", "segments": ["fine", "PANIC here"] }
        }),
    )
    .await;

    let messages = collect_until(&mut socket, "images-generated").await;

    let terminal = *progress(&messages).last().unwrap();
    assert_eq!(terminal["phase"], "failed");
    assert_eq!(terminal["completedCount"], 1);

    let result = &messages.last().unwrap()["data"];
    assert_eq!(result["success"], false);
    assert_eq!(result["phase"], "failed");
    assert!(result["error"].is_string());

    assert_eq!(state.metrics.snapshot().jobs_failed, 1);
    assert_eq!(state.engine.registry().live_count(), 0);
}

#[tokio::test]
async fn test_invalid_request_gets_error_event() {
    let (url, _state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({ "event": "generate-images", "data": { "segments": [] } }),
    )
    .await;

    let reply = next_message(&mut socket).await;
    assert_eq!(reply["event"], "error");
    assert!(
        reply["data"]["message"]
            .as_str()
            .unwrap()
            .contains("segments")
    );
}

#[tokio::test]
async fn test_disconnect_cancels_owned_jobs() {
    let (url, state) = start_server().await;
    let mut socket = connect(&url).await;

    send(
        &mut socket,
        json!({
            "event": "generate-images",
            "data": { "taskId": "orphan", "segments": ["SLOW first", "second", "third"] }
        }),
    )
    .await;
    let first = next_message(&mut socket).await;
    assert_eq!(first["data"]["phase"], "preparing");

    socket.close(None).await.unwrap();
    drop(socket);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.engine.registry().live_count() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "job never finished");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.jobs_cancelled, 1);
    assert_eq!(snapshot.items_succeeded, 1);
}

#[tokio::test]
async fn test_duplicate_live_task_id_gets_error_event() {
    let (url, state) = start_server().await;
    let mut socket = connect(&url).await;
    let request = json!({
        "event": "generate-images",
        "data": { "taskId": "ws-dup", "segments": ["SLOW first", "second"] }
    });

    send(&mut socket, request.clone()).await;
    let first = next_message(&mut socket).await;
    assert_eq!(first["data"]["phase"], "preparing");

    send(&mut socket, request).await;
    let reply = next_message(&mut socket).await;
    assert_eq!(reply["event"], "error");
    assert!(
        reply["data"]["message"]
            .as_str()
            .unwrap()
            .contains("already running")
    );

    // The original job is still registered and still cancellable
    assert!(state.engine.cancel(&JobId::new("ws-dup")));
    let messages = collect_until(&mut socket, "images-generated").await;
    let result = &messages.last().unwrap()["data"];
    assert_eq!(result["phase"], "cancelled");
    assert_eq!(result["results"].as_array().unwrap().len(), 1);
}
