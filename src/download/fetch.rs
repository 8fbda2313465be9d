//! HTTP fetcher for remote image locators

use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DownloadError, Result};
use crate::config::DownloadConfig;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
}

impl From<&DownloadConfig> for FetchConfig {
    fn from(config: &DownloadConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout.as_duration(),
            request_timeout: config.request_timeout.as_duration(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Image fetcher with bounded retries
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DownloadError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Fetch a URL, retrying with exponential backoff
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.fetch_once(url).await {
                Ok(bytes) => {
                    if attempts > 1 {
                        debug!(url, attempts, "Fetch succeeded after retry");
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    if attempts >= self.config.max_attempts {
                        warn!(url, attempts, error = %e, "Fetch failed after retries");
                        return Err(e);
                    }

                    warn!(url, attempts, error = %e, "Fetch failed, retrying");

                    // backoff, 2*backoff, 4*backoff...
                    let backoff = self.config.retry_backoff * 2u32.saturating_pow(attempts - 1);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Bytes> {
        debug!(url, "Starting fetch");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout
            } else if e.is_redirect() {
                DownloadError::TooManyRedirects
            } else {
                DownloadError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::RequestFailed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::RequestFailed(format!("Failed to read body: {}", e)))?;

        debug!(url, size = bytes.len(), "Fetch completed");

        Ok(bytes)
    }
}
