//! Client-side batch downloader
//!
//! Reads saved generation results, plans one file per image and saves them
//! one at a time through the engine with [`DownloadWorker`].

pub mod fetch;
pub mod locator;
pub mod plan;
pub mod worker;

pub use fetch::{FetchConfig, Fetcher};
pub use locator::SourceLocator;
pub use plan::{ResultsFile, plan_downloads};
pub use worker::{DownloadRequest, DownloadWorker, DownloadedFile, SavedAs};

use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::DownloadConfig;
use crate::engine::{
    Engine, EngineError, EngineOptions, ItemError, Job, JobId, JobReport, ProgressSink,
};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("Invalid image locator: {0}")]
    InvalidLocator(String),

    #[error("Failed to read results: {0}")]
    InvalidResults(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No downloadable images in results")]
    NothingToDownload,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl From<DownloadError> for ItemError {
    fn from(err: DownloadError) -> Self {
        ItemError::new(err.to_string())
    }
}

/// Download every image named in the results file at `input` into `output_dir`.
///
/// The run is registered under `job_id`, so `engine.cancel(job_id)` stops it
/// before the next image.
pub async fn download_results(
    engine: &Engine,
    config: &DownloadConfig,
    job_id: JobId,
    input: &Path,
    output_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<JobReport<DownloadedFile>> {
    let raw = tokio::fs::read_to_string(input).await?;
    let results: ResultsFile = serde_json::from_str(&raw)?;
    let requests = plan_downloads(&results.into_records());

    let job = Job::new(job_id, requests).map_err(|_| DownloadError::NothingToDownload)?;
    info!(job_id = %job.id, files = job.len(), output_dir = %output_dir.display(), "Starting downloads");

    tokio::fs::create_dir_all(output_dir).await?;
    let fetcher = Fetcher::new(FetchConfig::from(config))?;
    let worker = DownloadWorker::new(fetcher, output_dir, config.fallback_counts_as_success);

    Ok(engine.run(job, &worker, sink).await?)
}

/// Engine options for the downloader, honouring a per-run delay override
pub fn engine_options(config: &DownloadConfig, delay_ms: Option<u64>) -> EngineOptions {
    match delay_ms {
        Some(ms) => EngineOptions::sequential(std::time::Duration::from_millis(ms)),
        None => config.engine_options(),
    }
}
