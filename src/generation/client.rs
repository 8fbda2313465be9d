//! HTTP client for the upstream text and image generation service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::engine::ItemError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    RequestFailed(String),

    #[error("Generation request timed out")]
    Timeout,

    #[error("Generation service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("Generation service returned no images")]
    NoImages,

    #[error("Generation API key is not configured")]
    MissingCredentials,
}

pub type Result<T> = std::result::Result<T, GenerationError>;

impl From<GenerationError> for ItemError {
    fn from(err: GenerationError) -> Self {
        ItemError::new(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion parameters; the model comes from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Per-call image options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    pub size: String,
    pub watermark: bool,
    pub max_images: u32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            size: "2K".to_string(),
            watermark: true,
            max_images: 1,
        }
    }
}

/// One generated image, as a remote URL and/or inline base64 payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
}

/// The remote operations the generation workers depend on
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Run a chat completion and return the first choice's content
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Generate images for a fully built prompt
    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<Vec<GeneratedImage>>;
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct ImageBody<'a> {
    model: &'a str,
    prompt: &'a str,
    response_format: &'a str,
    size: &'a str,
    watermark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequential_image_generation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequential_image_generation_options: Option<SequentialOptions>,
}

#[derive(Serialize)]
struct SequentialOptions {
    max_images: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// reqwest-backed [`GenerationService`]
pub struct HttpGenerationClient {
    client: Client,
    config: GenerationConfig,
}

impl HttpGenerationClient {
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(config.request_timeout.as_duration())
            .build()
            .map_err(|e| GenerationError::RequestFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::MissingCredentials)?;
        let url = self.endpoint(path);
        debug!(%url, "Calling generation service");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                });
            warn!(%url, status = status.as_u16(), %message, "Generation service error");
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = ChatBody {
            model: &self.config.text_model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response: ChatResponse = self.post("chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse("no choices in reply".to_string()))
    }

    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<Vec<GeneratedImage>> {
        let sequential = options.max_images > 1;
        let body = ImageBody {
            model: &self.config.image_model,
            prompt,
            response_format: "url",
            size: &options.size,
            watermark: options.watermark,
            sequential_image_generation: sequential.then_some("auto"),
            sequential_image_generation_options: sequential.then_some(SequentialOptions {
                max_images: options.max_images,
            }),
        };

        let response: ImageResponse = self.post("images/generations", &body).await?;
        if response.data.is_empty() {
            return Err(GenerationError::NoImages);
        }
        Ok(response.data)
    }
}
