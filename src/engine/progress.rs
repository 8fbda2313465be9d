//! Progress events and the sinks that carry them to an observer.
//!
//! The engine pushes events into a [`ProgressSink`] and never waits on
//! delivery. If the observer is gone the event is dropped; the job itself
//! carries on.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::job::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Preparing,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

/// Observer-facing progress report for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub phase: Phase,
    pub completed_count: usize,
    pub total_count: usize,
    pub current_index: Option<usize>,
    pub message: String,
}

impl ProgressEvent {
    pub fn preparing(job_id: &JobId, total: usize) -> Self {
        Self {
            job_id: job_id.clone(),
            phase: Phase::Preparing,
            completed_count: 0,
            total_count: total,
            current_index: None,
            message: format!("Preparing {total} items"),
        }
    }

    pub fn running(
        job_id: &JobId,
        completed: usize,
        total: usize,
        index: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.clone(),
            phase: Phase::Running,
            completed_count: completed,
            total_count: total,
            current_index: Some(index),
            message: message.into(),
        }
    }

    pub fn completed(job_id: &JobId, total: usize, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.clone(),
            phase: Phase::Completed,
            completed_count: total,
            total_count: total,
            current_index: None,
            message: message.into(),
        }
    }

    pub fn cancelled(job_id: &JobId, completed: usize, total: usize) -> Self {
        Self {
            job_id: job_id.clone(),
            phase: Phase::Cancelled,
            completed_count: completed,
            total_count: total,
            current_index: None,
            message: format!("Cancelled after {completed} of {total} items"),
        }
    }

    /// Terminal event emitted by the hosting layer when the engine itself broke
    pub fn failed(
        job_id: &JobId,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.clone(),
            phase: Phase::Failed,
            completed_count: completed,
            total_count: total,
            current_index: None,
            message: message.into(),
        }
    }
}

/// Push-style destination for progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into an unbounded channel; a closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        // Observer went away; the job keeps running regardless.
        let _ = self.tx.send(event);
    }
}

/// Renders progress as log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        match event.phase {
            Phase::Failed => warn!(
                job_id = %event.job_id,
                completed = event.completed_count,
                total = event.total_count,
                "{}",
                event.message
            ),
            _ => info!(
                job_id = %event.job_id,
                phase = ?event.phase,
                completed = event.completed_count,
                total = event.total_count,
                "{}",
                event.message
            ),
        }
    }
}
