use thiserror::Error;

use crate::config::Limits;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("text must not be empty")]
    EmptyText,
    #[error("text exceeds {0} characters")]
    TextTooLong(usize),
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("segments must contain between 1 and {0} entries")]
    InvalidSegmentCount(usize),
    #[error("segment {0} is empty")]
    EmptySegment(usize),
    #[error("segmentCount must be at least 1")]
    ZeroSegmentCount,
}

fn require_text(text: &str, max_chars: usize) -> Result<(), RequestValidationError> {
    if text.trim().is_empty() {
        return Err(RequestValidationError::EmptyText);
    }
    if text.chars().count() > max_chars {
        return Err(RequestValidationError::TextTooLong(max_chars));
    }
    Ok(())
}

/// Text submitted for segmentation or preview
pub fn validate_source_text(
    text: &str,
    segment_count: Option<usize>,
    limits: &Limits,
) -> Result<(), RequestValidationError> {
    require_text(text, limits.max_text_chars)?;
    if segment_count == Some(0) {
        return Err(RequestValidationError::ZeroSegmentCount);
    }
    Ok(())
}

pub fn validate_optimize_text(text: &str, limits: &Limits) -> Result<(), RequestValidationError> {
    require_text(text, limits.max_optimize_chars)
}

pub fn validate_prompt(prompt: &str) -> Result<(), RequestValidationError> {
    if prompt.trim().is_empty() {
        return Err(RequestValidationError::EmptyPrompt);
    }
    Ok(())
}

pub fn validate_segments(segments: &[String], limits: &Limits) -> Result<(), RequestValidationError> {
    if !(1..=limits.max_batch_segments).contains(&segments.len()) {
        return Err(RequestValidationError::InvalidSegmentCount(
            limits.max_batch_segments,
        ));
    }

    if let Some(index) = segments.iter().position(|s| s.trim().is_empty()) {
        return Err(RequestValidationError::EmptySegment(index));
    }

    Ok(())
}
