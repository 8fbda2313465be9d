use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use super::validation::RequestValidationError;
use crate::engine::EngineError;
use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("job {0} is already running")]
    Conflict(String),
    #[error("upstream generation failed: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::Conflict(_) => "JOB_CONFLICT",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(value: RequestValidationError) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::EmptyJob(_) => ApiError::InvalidPayload(value.to_string()),
            EngineError::DuplicateJob(job_id) => ApiError::Conflict(job_id.to_string()),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(value: GenerationError) -> Self {
        ApiError::Upstream(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::JobId;

    #[test]
    fn test_engine_errors_map_to_status() {
        let duplicate = ApiError::from(EngineError::DuplicateJob(JobId::new("t")));
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(duplicate.code(), "JOB_CONFLICT");

        let empty = ApiError::from(EngineError::EmptyJob(JobId::new("t")));
        assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);
    }
}
