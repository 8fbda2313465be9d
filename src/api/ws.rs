//! WebSocket progress channel.
//!
//! Each message is `{"event": <name>, "data": {...}}`. A connection submits
//! jobs, receives their progress events and results, and may cancel them.
//! Jobs belong to the connection that submitted them: when it goes away,
//! every job it still has running is flagged for cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::services::{batch_response, image_options, job_id_for};
use super::state::AppState;
use super::validation;
use crate::engine::{
    Engine, ItemOutcome, Job, JobId, JobReport, Phase, ProgressEvent, ProgressSink, Worker,
};
use crate::generation::{
    ImageResult, ImageWorker, SegmentRequest, SegmentType, SegmentWorker, Segmentation, templates,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTextData {
    #[serde(default)]
    pub task_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub segment_count: Option<usize>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImagesData {
    #[serde(default)]
    pub task_id: Option<String>,
    pub segments: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub remove_watermark: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub task_id: JobId,
}

/// Client → server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    SegmentText(SegmentTextData),
    GenerateImages(GenerateImagesData),
    CancelTask(TaskRef),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegmented {
    pub task_id: JobId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_types: Option<Vec<SegmentType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagesGenerated {
    pub task_id: JobId,
    pub success: bool,
    pub phase: Phase,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<crate::engine::ItemRecord<ImageResult>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Progress(ProgressEvent),
    TextSegmented(TextSegmented),
    ImagesGenerated(ImagesGenerated),
    TaskCancelled(TaskRef),
    Error(ErrorData),
}

impl ServerMessage {
    fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorData {
            message: message.into(),
        })
    }
}

/// Forwards one job's progress to its connection and remembers how far it got
struct ConnectionSink {
    tx: mpsc::UnboundedSender<ServerMessage>,
    completed: AtomicUsize,
}

impl ConnectionSink {
    fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            tx,
            completed: AtomicUsize::new(0),
        }
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl ProgressSink for ConnectionSink {
    fn emit(&self, event: ProgressEvent) {
        self.completed.store(event.completed_count, Ordering::Relaxed);
        if self.tx.send(ServerMessage::Progress(event)).is_err() {
            debug!("Progress dropped, connection gone");
        }
    }
}

/// Why a job produced no report
type JobCrash = String;

struct Connection {
    id: String,
    state: AppState,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    fn send(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            debug!(conn_id = %self.id, "Outbound channel closed");
        }
    }

    fn engine(&self) -> &Engine {
        &self.state.engine
    }

    fn dispatch(&self, message: ClientMessage) {
        match message {
            ClientMessage::SegmentText(data) => self.segment_text(data),
            ClientMessage::GenerateImages(data) => self.generate_images(data),
            ClientMessage::CancelTask(TaskRef { task_id }) => {
                if self.engine().cancel(&task_id) {
                    info!(conn_id = %self.id, %task_id, "Task cancellation requested");
                    self.send(ServerMessage::TaskCancelled(TaskRef { task_id }));
                } else {
                    debug!(conn_id = %self.id, %task_id, "Cancel for inactive task ignored");
                }
            }
        }
    }

    fn segment_text(&self, data: SegmentTextData) {
        let limits = &self.state.config.limits;
        if let Err(err) = validation::validate_source_text(&data.text, data.segment_count, limits) {
            self.send(ServerMessage::error(err.to_string()));
            return;
        }
        let job = Job::single(
            job_id_for(data.task_id),
            SegmentRequest {
                text: data.text,
                segment_count: data.segment_count,
                custom_prompt: data.custom_prompt,
            },
        );
        let worker = SegmentWorker::new(self.state.generator.clone());

        self.spawn_job(job, worker, |job_id, outcome| {
            let message = match outcome {
                Ok(report) => text_segmented(job_id, report),
                Err(reason) => TextSegmented {
                    task_id: job_id,
                    success: false,
                    segments: None,
                    segment_types: None,
                    error: Some(reason),
                },
            };
            vec![ServerMessage::TextSegmented(message)]
        });
    }

    fn generate_images(&self, data: GenerateImagesData) {
        if let Err(err) = validation::validate_segments(&data.segments, &self.state.config.limits) {
            self.send(ServerMessage::error(err.to_string()));
            return;
        }
        let job = match Job::new(job_id_for(data.task_id), data.segments) {
            Ok(job) => job,
            Err(err) => return self.send(ServerMessage::error(err.to_string())),
        };

        let style = templates::resolve_style(data.template.as_deref());
        let options = image_options(&self.state.config.generation, None, !data.remove_watermark, 1);
        let worker = ImageWorker::new(self.state.generator.clone(), style, options);

        self.spawn_job(job, worker, |job_id, outcome| {
            let message = match outcome {
                Ok(report) => {
                    let batch = batch_response(report);
                    ImagesGenerated {
                        task_id: job_id,
                        success: batch.phase == Phase::Completed,
                        phase: batch.phase,
                        succeeded: batch.succeeded,
                        failed: batch.failed,
                        results: Some(batch.results),
                        error: None,
                    }
                }
                Err(reason) => ImagesGenerated {
                    task_id: job_id,
                    success: false,
                    phase: Phase::Failed,
                    succeeded: 0,
                    failed: 0,
                    results: None,
                    error: Some(reason),
                },
            };
            vec![ServerMessage::ImagesGenerated(message)]
        });
    }

    /// Register the job to this connection, run it on its own task, and
    /// report the result (or the crash) back over the channel. A job whose
    /// id is already live is refused with an `error` event.
    fn spawn_job<W, F>(&self, job: Job<W::Input>, worker: W, finish: F)
    where
        W: Worker + 'static,
        W::Input: 'static,
        W::Output: 'static,
        F: FnOnce(JobId, Result<JobReport<W::Output>, JobCrash>) -> Vec<ServerMessage> + Send + 'static,
    {
        let job_id = job.id.clone();
        let total = job.len();
        let sink = Arc::new(ConnectionSink::new(self.tx.clone()));
        let submission = match self.engine().submit(job, Some(&self.id)) {
            Ok(submission) => submission,
            Err(err) => {
                debug!(conn_id = %self.id, %job_id, "Job rejected: {err}");
                return self.send(ServerMessage::error(err.to_string()));
            }
        };

        let run_sink = sink.clone();
        let handle = tokio::spawn(async move { submission.run(&worker, run_sink.as_ref()).await });

        let metrics = self.state.metrics.clone();
        let tx = self.tx.clone();
        let conn_id = self.id.clone();
        tokio::spawn(async move {
            let outcome = match handle.await {
                Ok(report) => Ok(report),
                Err(err) => {
                    error!(%conn_id, %job_id, error = %err, "Job task crashed");
                    metrics.job_failed();
                    let reason = "job terminated unexpectedly".to_string();
                    sink.emit(ProgressEvent::failed(&job_id, sink.completed(), total, reason.clone()));
                    Err(reason)
                }
            };

            for message in finish(job_id, outcome) {
                if tx.send(message).is_err() {
                    debug!(%conn_id, "Result dropped, connection gone");
                    break;
                }
            }
        });
    }
}

fn text_segmented(job_id: JobId, report: JobReport<Segmentation>) -> TextSegmented {
    let cancelled = report.is_cancelled();
    match report.into_single() {
        Some(ItemOutcome::Success { payload }) => TextSegmented {
            task_id: job_id,
            success: true,
            segments: Some(payload.segments),
            segment_types: payload.segment_types,
            error: None,
        },
        Some(ItemOutcome::Failure { reason }) => TextSegmented {
            task_id: job_id,
            success: false,
            segments: None,
            segment_types: None,
            error: Some(reason),
        },
        None => TextSegmented {
            task_id: job_id,
            success: false,
            segments: None,
            segment_types: None,
            error: Some(if cancelled { "cancelled" } else { "no result" }.to_string()),
        },
    }
}

/// HTTP handler that upgrades the connection to WebSocket (GET /ws)
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "WebSocket connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (mut sink, mut stream) = socket.split();

    // Sender task: serialize outbound messages onto the socket
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    warn!(conn_id = %sender_conn_id, error = %e, "Failed to serialize message");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    let connection = Connection {
        id: conn_id.clone(),
        state: state.clone(),
        tx,
    };

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(message) => connection.dispatch(message),
                Err(e) => {
                    debug!(conn_id = %conn_id, error = %e, "Unrecognised client message");
                    connection.send(ServerMessage::error(format!("invalid message: {e}")));
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    let orphaned = state.engine.registry().cancel_owned_by(&conn_id);
    if !orphaned.is_empty() {
        info!(conn_id = %conn_id, jobs = orphaned.len(), "Cancelling jobs of closed connection");
    }

    // Socket is closed; undelivered messages are dropped.
    drop(connection);
    send_task.abort();
    info!(conn_id = %conn_id, "WebSocket disconnected");
}
