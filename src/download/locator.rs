//! Where an image's bytes come from

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::DownloadError;

/// Image source named by a result: inline bytes or a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    Inline { mime: String, bytes: Vec<u8> },
    Remote(String),
}

impl SourceLocator {
    pub fn parse(raw: &str) -> Result<Self, DownloadError> {
        let raw = raw.trim();

        if let Some(rest) = raw.strip_prefix("data:") {
            return parse_data_uri(rest);
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Remote(raw.to_string()));
        }

        Err(DownloadError::InvalidLocator(truncate(raw)))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }
}

/// Build a `data:` locator for an inline base64 PNG
pub fn inline_png(b64: &str) -> String {
    format!("data:image/png;base64,{b64}")
}

fn parse_data_uri(rest: &str) -> Result<SourceLocator, DownloadError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DownloadError::InvalidLocator("data URI without payload".to_string()))?;

    let (mime, base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let mime = if mime.is_empty() { "text/plain" } else { mime };

    let bytes = if base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| DownloadError::InvalidLocator(format!("bad base64 payload: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };

    Ok(SourceLocator::Inline {
        mime: mime.to_string(),
        bytes,
    })
}

fn truncate(raw: &str) -> String {
    const MAX: usize = 64;
    if raw.chars().count() > MAX {
        format!("{}...", raw.chars().take(MAX).collect::<String>())
    } else {
        raw.to_string()
    }
}
