use super::models::Config;
use thiserror::Error;

const MAX_BODY_BYTES: u64 = 100 * 1024 * 1024; // 100 MB

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("engine concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("Invalid generation base_url '{url}', expected http:// or https://")]
    InvalidBaseUrl { url: String },

    #[error("min_text_chars ({min}) exceeds max_text_chars ({max})")]
    TextLimitsInverted { min: usize, max: usize },

    #[error("Limit must be positive: {field}")]
    ZeroLimit { field: &'static str },

    #[error("download max_attempts must be at least 1")]
    ZeroDownloadAttempts,

    #[error("max_body_bytes ({actual}) exceeds limit of 100MB ({limit})")]
    BodyLimitTooLarge { actual: u64, limit: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_generation(config)?;
    validate_engine(config)?;
    validate_limits(config)?;
    validate_download(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    let actual = config.server.max_body_bytes.as_u64();
    if actual > MAX_BODY_BYTES {
        return Err(ValidationError::BodyLimitTooLarge {
            actual,
            limit: MAX_BODY_BYTES,
        });
    }
    Ok(())
}

fn validate_generation(config: &Config) -> Result<(), ValidationError> {
    let url = &config.generation.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ValidationError::InvalidBaseUrl { url: url.clone() });
    }
    Ok(())
}

fn validate_engine(config: &Config) -> Result<(), ValidationError> {
    if config.engine.concurrency == 0 {
        return Err(ValidationError::ZeroConcurrency);
    }
    Ok(())
}

fn validate_limits(config: &Config) -> Result<(), ValidationError> {
    let limits = &config.limits;

    if limits.min_text_chars > limits.max_text_chars {
        return Err(ValidationError::TextLimitsInverted {
            min: limits.min_text_chars,
            max: limits.max_text_chars,
        });
    }

    if limits.max_batch_segments == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "max_batch_segments",
        });
    }

    if limits.max_optimize_chars == 0 {
        return Err(ValidationError::ZeroLimit {
            field: "max_optimize_chars",
        });
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ValidationError> {
    if config.download.max_attempts == 0 {
        return Err(ValidationError::ZeroDownloadAttempts);
    }
    Ok(())
}
