use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{
    error::ApiError,
    models::{
        ApiResponse, BatchResponse, CancelResponse, GenerateBatchRequest, GenerateImageRequest,
        HealthResponse, OptimizeTextRequest, OptimizeTextResponse, PreviewSegmentRequest,
        PreviewSegmentResponse, SegmentTextRequest, ValidateTextRequest,
    },
    state::AppState,
    validation,
};
use crate::config::GenerationConfig;
use crate::engine::{ItemOutcome, Job, JobId, JobReport, JobState, LogSink, Phase};
use crate::generation::{
    ImageOptions, ImageResult, ImageWorker, OptimizationKind, SegmentRequest, SegmentWorker,
    segment::{self, DEFAULT_SEGMENT_COUNT},
    templates,
};

/// Image options for a request, falling back to configured defaults
pub(crate) fn image_options(
    config: &GenerationConfig,
    size: Option<String>,
    watermark: bool,
    max_images: u32,
) -> ImageOptions {
    ImageOptions {
        size: size.unwrap_or_else(|| config.image_size.clone()),
        watermark,
        max_images: max_images.max(1),
    }
}

/// Aggregate a finished image job into the batch response shape
pub(crate) fn batch_response(report: JobReport<ImageResult>) -> BatchResponse {
    let phase = match report.state {
        JobState::Cancelled => Phase::Cancelled,
        _ => Phase::Completed,
    };
    let job_id = report.job_id.clone();
    let aggregate = report.into_aggregate();

    BatchResponse {
        job_id,
        phase,
        succeeded: aggregate.succeeded,
        failed: aggregate.failed,
        results: aggregate.items,
    }
}

/// Caller-chosen id, or a fresh one. Uniqueness is enforced when the job is submitted.
pub(crate) fn job_id_for(task_id: Option<String>) -> JobId {
    task_id
        .filter(|id| !id.trim().is_empty())
        .map(JobId::from)
        .unwrap_or_else(JobId::generate)
}

/// Text segmentation (POST /api/text/segment)
///
/// Runs as a job of size 1; an upstream failure maps to 502.
pub async fn segment_text(
    State(state): State<AppState>,
    Json(request): Json<SegmentTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_source_text(&request.text, request.segment_count, &state.config.limits)?;

    let job = Job::single(
        JobId::generate(),
        SegmentRequest {
            text: request.text,
            segment_count: request.segment_count,
            custom_prompt: request.custom_prompt,
        },
    );
    let worker = SegmentWorker::new(state.generator.clone());
    let report = state.engine.run(job, &worker, &LogSink).await?;

    match report.into_single() {
        Some(ItemOutcome::Success { payload }) => Ok(Json(ApiResponse::ok(payload))),
        Some(ItemOutcome::Failure { reason }) => Err(ApiError::Upstream(reason)),
        None => Err(ApiError::Internal("segmentation was cancelled".to_string())),
    }
}

/// Local preview split (POST /api/text/preview-segment)
pub async fn preview_segment(
    State(state): State<AppState>,
    Json(request): Json<PreviewSegmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_source_text(&request.text, request.segment_count, &state.config.limits)?;

    let count = request.segment_count.unwrap_or(DEFAULT_SEGMENT_COUNT);
    let segments = segment::preview_segments(&request.text, count);

    Ok(Json(ApiResponse::ok(PreviewSegmentResponse {
        segments,
        original_text: request.text,
        is_preview: true,
    })))
}

/// Text checks (POST /api/text/validate); always 200, issues in the body
pub async fn validate_text(
    State(state): State<AppState>,
    Json(request): Json<ValidateTextRequest>,
) -> impl IntoResponse {
    Json(ApiResponse::ok(segment::validate_text(
        &request.text,
        &state.config.limits,
    )))
}

/// Text optimisation (POST /api/text/optimize)
pub async fn optimize_text(
    State(state): State<AppState>,
    Json(request): Json<OptimizeTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_optimize_text(&request.text, &state.config.limits)?;

    let kind = request
        .optimization_type
        .as_deref()
        .map(OptimizationKind::from_name)
        .unwrap_or_default();
    let optimized = segment::optimize_text(state.generator.as_ref(), &request.text, kind).await?;

    Ok(Json(ApiResponse::ok(OptimizeTextResponse {
        original_text: request.text,
        optimized_text: optimized,
        optimization_type: kind,
    })))
}

/// Single image (POST /api/image/generate), run as a job of size 1
pub async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_prompt(&request.prompt)?;

    let options = request.options;
    let style = templates::resolve_style(options.template.as_deref());
    let image_options = image_options(
        &state.config.generation,
        options.size,
        options.watermark.unwrap_or(true),
        options.max_images.unwrap_or(1),
    );
    let worker = ImageWorker::new(state.generator.clone(), style, image_options).with_plain_labels();

    let job = Job::single(JobId::generate(), request.prompt);
    let report = state.engine.run(job, &worker, &LogSink).await?;

    match report.into_single() {
        Some(ItemOutcome::Success { payload }) => Ok(Json(ApiResponse::ok(payload))),
        Some(ItemOutcome::Failure { reason }) => Err(ApiError::Upstream(reason)),
        None => Err(ApiError::Internal("image generation was cancelled".to_string())),
    }
}

/// Batch generation (POST /api/image/generate-batch)
///
/// Per-segment failures are reported in the results, never as an HTTP
/// error. The job can be cancelled from elsewhere through its `taskId`.
pub async fn generate_batch(
    State(state): State<AppState>,
    Json(request): Json<GenerateBatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_segments(&request.segments, &state.config.limits)?;

    let job_id = job_id_for(request.task_id);
    let style = templates::resolve_style(request.template.as_deref());
    let options = image_options(&state.config.generation, None, !request.remove_watermark, 1);
    let worker = ImageWorker::new(state.generator.clone(), style, options);

    let job = Job::new(job_id, request.segments)?;
    let report = state.engine.run(job, &worker, &LogSink).await?;

    Ok(Json(ApiResponse::ok(batch_response(report))))
}

/// Template catalogue (GET /api/image/templates)
pub async fn list_templates() -> impl IntoResponse {
    Json(ApiResponse::ok(templates::TEMPLATES))
}

/// Cooperative cancellation (POST /api/jobs/{job_id}/cancel)
///
/// `cancelled: false` means the job was unknown, finished or already flagged.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    let job_id = JobId::from(job_id);
    let cancelled = state.engine.cancel(&job_id);
    tracing::info!(%job_id, cancelled, "Cancel requested over HTTP");

    Json(CancelResponse { job_id, cancelled })
}

/// Health check endpoint (GET /health)
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("engine".to_string(), "healthy".to_string());
    components.insert(
        "generation".to_string(),
        if state.config.generation.api_key.is_some() {
            "configured".to_string()
        } else {
            "missing_api_key".to_string()
        },
    );

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
        metrics: state.metrics.snapshot(),
        live_jobs: state.engine.registry().live_count(),
    };

    (StatusCode::OK, Json(response))
}
