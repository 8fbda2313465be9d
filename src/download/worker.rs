use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::fetch::Fetcher;
use super::locator::SourceLocator;
use super::DownloadError;
use crate::engine::{ItemError, WorkItem, Worker};

/// One image to save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub file_name: String,
    pub locator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedAs {
    /// The image bytes
    Image,
    /// An internet shortcut pointing at the unreachable image
    Shortcut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    pub saved_as: SavedAs,
}

/// Saves one image per item into `output_dir`
pub struct DownloadWorker {
    fetcher: Fetcher,
    output_dir: PathBuf,
    fallback_counts_as_success: bool,
}

impl DownloadWorker {
    pub fn new(fetcher: Fetcher, output_dir: impl Into<PathBuf>, fallback_counts_as_success: bool) -> Self {
        Self {
            fetcher,
            output_dir: output_dir.into(),
            fallback_counts_as_success,
        }
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<u64, DownloadError> {
        tokio::fs::write(path, bytes).await?;
        Ok(bytes.len() as u64)
    }

    /// Write `<name>.url` so the raw locator can be opened by hand
    async fn write_shortcut(&self, file_name: &str, locator: &str) -> Result<DownloadedFile, DownloadError> {
        let path = self.output_dir.join(format!("{file_name}.url"));
        let body = format!("[InternetShortcut]\r\nURL={locator}\r\n");
        let size = self.write(&path, body.as_bytes()).await?;

        Ok(DownloadedFile {
            path,
            size,
            saved_as: SavedAs::Shortcut,
        })
    }
}

#[async_trait]
impl Worker for DownloadWorker {
    type Input = DownloadRequest;
    type Output = DownloadedFile;

    async fn process(&self, item: &WorkItem<DownloadRequest>) -> Result<DownloadedFile, ItemError> {
        let request = &item.input;
        let path = self.output_dir.join(&request.file_name);

        let bytes = match SourceLocator::parse(&request.locator)? {
            SourceLocator::Inline { bytes, .. } => bytes::Bytes::from(bytes),
            SourceLocator::Remote(url) => match self.fetcher.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(file = %request.file_name, error = %err, "Fetch failed, writing shortcut");
                    let shortcut = self.write_shortcut(&request.file_name, &url).await?;
                    if self.fallback_counts_as_success {
                        return Ok(shortcut);
                    }
                    return Err(ItemError::new(format!(
                        "{err}; link saved to {}",
                        shortcut.path.display()
                    )));
                }
            },
        };

        let size = self.write(&path, &bytes).await?;
        debug!(path = %path.display(), size, "Image saved");

        Ok(DownloadedFile {
            path,
            size,
            saved_as: SavedAs::Image,
        })
    }

    fn label(&self, item: &WorkItem<DownloadRequest>) -> String {
        item.input.file_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::fetch::FetchConfig;
    use crate::download::locator::inline_png;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fetcher() -> Fetcher {
        Fetcher::new(FetchConfig {
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
            max_attempts: 1,
            retry_backoff: Duration::from_millis(1),
            user_agent: "test".to_string(),
        })
        .unwrap()
    }

    fn item(file_name: &str, locator: &str) -> WorkItem<DownloadRequest> {
        WorkItem {
            index: 0,
            input: DownloadRequest {
                file_name: file_name.to_string(),
                locator: locator.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_inline_locator_is_written() {
        let dir = TempDir::new().unwrap();
        let worker = DownloadWorker::new(fetcher(), dir.path(), false);

        let saved = worker.process(&item("note_cover.png", &inline_png("aGVsbG8="))).await.unwrap();

        assert_eq!(saved.saved_as, SavedAs::Image);
        assert_eq!(saved.size, 5);
        assert_eq!(std::fs::read(dir.path().join("note_cover.png")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_unreachable_remote_writes_shortcut() {
        let dir = TempDir::new().unwrap();
        let worker = DownloadWorker::new(fetcher(), dir.path(), false);
        let url = "http://127.0.0.1:9/gone.png";

        let err = worker.process(&item("note_cover.png", url)).await.unwrap_err();

        assert!(err.reason().contains("note_cover.png.url"));
        let shortcut = std::fs::read_to_string(dir.path().join("note_cover.png.url")).unwrap();
        assert!(shortcut.contains(&format!("URL={url}")));
        assert!(!dir.path().join("note_cover.png").exists());
    }

    #[tokio::test]
    async fn test_shortcut_counts_as_success_when_configured() {
        let dir = TempDir::new().unwrap();
        let worker = DownloadWorker::new(fetcher(), dir.path(), true);

        let saved = worker.process(&item("a.png", "http://127.0.0.1:9/gone.png")).await.unwrap();

        assert_eq!(saved.saved_as, SavedAs::Shortcut);
    }

    #[tokio::test]
    async fn test_invalid_locator_is_item_failure() {
        let dir = TempDir::new().unwrap();
        let worker = DownloadWorker::new(fetcher(), dir.path(), true);

        let err = worker.process(&item("a.png", "not a url")).await.unwrap_err();

        assert!(err.reason().starts_with("Invalid image locator"));
    }
}
