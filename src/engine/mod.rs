//! Batch job execution engine.
//!
//! Runs an ordered list of independent, failure-prone remote operations,
//! reporting progress after every item and honouring cooperative
//! cancellation between items. Used for image generation on the server and
//! for batch downloads on the client.
//!
//! ## Key Components
//!
//! - [`Job`] / [`WorkItem`] / [`JobId`] - what gets submitted
//! - [`Worker`] - the per-item remote operation
//! - [`Engine`] - drives a job to `Completed` or `Cancelled`
//! - [`CancellationRegistry`] - live jobs and their cancel flags
//! - [`ProgressSink`] - where [`ProgressEvent`]s go
//! - [`aggregate`] - outcomes to `{succeeded, failed, items}`
//!
//! ## Example
//!
//! ```rust,ignore
//! let engine = Engine::new(registry, metrics).with_options(EngineOptions::sequential(delay));
//! let job = Job::new(JobId::generate(), segments)?;
//! let report = engine.run(job, &worker, &sink).await?;
//! let result = report.into_aggregate();
//! ```

mod job;
mod outcome;
mod progress;
mod registry;
mod runner;
mod worker;

pub use job::{Job, JobId, JobState, WorkItem};
pub use outcome::{
    Aggregate, FALLBACK_REASON, ItemError, ItemOutcome, ItemRecord, Summary, aggregate,
};
pub use progress::{ChannelSink, LogSink, NullSink, Phase, ProgressEvent, ProgressSink};
pub use registry::{CancellationRegistry, Registration};
pub use runner::{Engine, EngineOptions, JobReport, Submission};
pub use worker::Worker;

use thiserror::Error;

/// Submission-time errors; nothing has been registered when these occur
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("job {0} has no items")]
    EmptyJob(JobId),
    #[error("job {0} is already running")]
    DuplicateJob(JobId),
}
