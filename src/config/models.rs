use crate::engine::EngineOptions;
use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
    /// Allowed browser origin; any origin when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
            cors_origin: None,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(50 * 1024 * 1024) // 50 MB
}

/// Upstream text and image generation service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    /// Bearer token (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://ark.cn-beijing.volces.com/api/v3".to_string()
}

fn default_text_model() -> String {
    "doubao-seed-1-6-250615".to_string()
}

fn default_image_model() -> String {
    "doubao-seedream-4-0-250828".to_string()
}

fn default_image_size() -> String {
    "2K".to_string()
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

/// Engine settings used for server-side jobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_delay")]
    pub inter_item_delay: HumanDuration,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: default_engine_delay(),
            concurrency: default_concurrency(),
        }
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            inter_item_delay: self.inter_item_delay.as_duration(),
            concurrency: self.concurrency,
        }
    }
}

fn default_engine_delay() -> HumanDuration {
    HumanDuration::from_secs(1)
}

fn default_concurrency() -> usize {
    1
}

/// Request limits enforced by the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Limits {
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_max_optimize_chars")]
    pub max_optimize_chars: usize,
    #[serde(default = "default_max_batch_segments")]
    pub max_batch_segments: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            min_text_chars: default_min_text_chars(),
            max_optimize_chars: default_max_optimize_chars(),
            max_batch_segments: default_max_batch_segments(),
        }
    }
}

fn default_max_text_chars() -> usize {
    5000
}

fn default_min_text_chars() -> usize {
    10
}

fn default_max_optimize_chars() -> usize {
    1000
}

fn default_max_batch_segments() -> usize {
    10
}

/// Client-side batch downloader
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_delay")]
    pub inter_item_delay: HumanDuration,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_download_timeout")]
    pub request_timeout: HumanDuration,
    /// Fetch attempts per image, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Whether writing a shortcut file for an unreachable image counts as success
    #[serde(default)]
    pub fallback_counts_as_success: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            inter_item_delay: default_download_delay(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_download_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
            user_agent: default_user_agent(),
            fallback_counts_as_success: false,
        }
    }
}

impl DownloadConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::sequential(self.inter_item_delay.as_duration())
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff.as_duration()
    }
}

fn default_download_delay() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_download_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff() -> HumanDuration {
    HumanDuration::from_millis(500)
}

fn default_user_agent() -> String {
    format!("notegen/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:3001");
        assert_eq!(config.server.max_body_bytes.as_u64(), 50 * 1024 * 1024);
        assert_eq!(config.generation.image_size, "2K");
        assert_eq!(config.engine.options(), EngineOptions::sequential(Duration::from_secs(1)));
        assert_eq!(config.limits.max_batch_segments, 10);
        assert_eq!(config.download.inter_item_delay.as_duration(), Duration::from_millis(500));
        assert!(!config.download.fallback_counts_as_success);
    }
}
