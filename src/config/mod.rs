//! Configuration management for notegen
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use notegen::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `NOTEGEN__<section>__<key>`
//!
//! Examples:
//! - `NOTEGEN__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `NOTEGEN__ENGINE__INTER_ITEM_DELAY=2s`
//! - `NOTEGEN__DOWNLOAD__MAX_ATTEMPTS=3`
//!
//! The generation API key is read from `NOTEGEN_API_KEY` (or `DOUBAO_API_KEY`)
//! and never from the file.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/notegen.toml`.
//! This can be overridden using the `NOTEGEN_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{Config, DownloadConfig, EngineConfig, GenerationConfig, Limits, ServerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[engine]\nconcurrency = 1\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.engine.concurrency, 1);
        assert_eq!(config.limits.max_batch_segments, 10);
    }

    #[test]
    fn test_validation_catches_zero_concurrency() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[engine]\nconcurrency = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_malformed_value_is_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[engine]\ninter_item_delay = \"soon\"\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(result.unwrap_err(), ConfigError::LoadError(_)));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:3001"
max_body_bytes = "50MB"
cors_origin = "http://localhost:5173"

[generation]
base_url = "https://ark.cn-beijing.volces.com/api/v3"
text_model = "doubao-seed-1-6-250615"
image_model = "doubao-seedream-4-0-250828"
image_size = "2K"
request_timeout = "60s"
connect_timeout = "10s"

[engine]
inter_item_delay = "1s"
concurrency = 1

[limits]
max_text_chars = 5000
min_text_chars = 10
max_optimize_chars = 1000
max_batch_segments = 10

[download]
inter_item_delay = "500ms"
request_timeout = "30s"
max_attempts = 3
retry_backoff = "250ms"
user_agent = "notegen-test"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();

        assert_eq!(config.server.cors_origin.as_deref(), Some("http://localhost:5173"));
        assert_eq!(config.generation.request_timeout.as_duration(), Duration::from_secs(60));
        assert_eq!(config.engine.options().inter_item_delay, Duration::from_secs(1));
        assert_eq!(config.download.max_attempts, 3);
        assert_eq!(config.download.retry_backoff(), Duration::from_millis(250));
        assert_eq!(config.download.user_agent, "notegen-test");
    }
}
