//! Request and response bodies for the HTTP API.
//!
//! Successful responses use the `{ "success": true, "data": ... }` envelope;
//! errors use [`ErrorResponse`]. Field names are camelCase on the wire.
//!
//! ```json
//! POST /api/image/generate-batch
//! { "taskId": "t-1", "segments": ["cover text", "first card"], "template": "xiaohongshu-classic" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::{ItemRecord, JobId, Phase, Summary};
use crate::generation::ImageResult;
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTextRequest {
    pub text: String,
    #[serde(default)]
    pub segment_count: Option<usize>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSegmentRequest {
    pub text: String,
    #[serde(default)]
    pub segment_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSegmentResponse {
    pub segments: Vec<String>,
    pub original_text: String,
    pub is_preview: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ValidateTextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeTextRequest {
    pub text: String,
    #[serde(default)]
    pub optimization_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeTextResponse {
    pub original_text: String,
    pub optimized_text: String,
    pub optimization_type: crate::generation::OptimizationKind,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequestOptions {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub watermark: Option<bool>,
    #[serde(default)]
    pub max_images: Option<u32>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub options: ImageRequestOptions,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBatchRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    pub segments: Vec<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub remove_watermark: bool,
}

/// Aggregated outcome of a batch job
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub job_id: JobId,
    pub phase: Phase,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ItemRecord<ImageResult>>,
}

impl BatchResponse {
    pub fn summary(&self) -> Summary {
        Summary {
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
    pub metrics: MetricsSnapshot,
    pub live_jobs: usize,
}
