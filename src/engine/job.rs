use serde::{Deserialize, Serialize};
use std::fmt;

use super::EngineError;

/// Correlation key shared by submission, progress, cancellation and results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a time-sortable id for callers that did not supply one
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One unit of remote work, addressed by its position in the job
#[derive(Debug, Clone)]
pub struct WorkItem<I> {
    pub index: usize,
    pub input: I,
}

/// Lifecycle of a job as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Cancelling,
    Completed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }
}

/// Ordered sequence of work items submitted together under one id
#[derive(Debug, Clone)]
pub struct Job<I> {
    pub id: JobId,
    pub items: Vec<WorkItem<I>>,
}

impl<I> Job<I> {
    /// Build a job from inputs in submission order.
    ///
    /// Rejects an empty input list before anything is registered.
    pub fn new(id: JobId, inputs: Vec<I>) -> Result<Self, EngineError> {
        if inputs.is_empty() {
            return Err(EngineError::EmptyJob(id));
        }

        let items = inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| WorkItem { index, input })
            .collect();

        Ok(Self { id, items })
    }

    /// A job holding exactly one item
    pub fn single(id: JobId, input: I) -> Self {
        Self {
            id,
            items: vec![WorkItem { index: 0, input }],
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
