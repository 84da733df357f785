//! Generative provider client.
//!
//! Two calls against an OpenAI-compatible HTTP API:
//!
//! - `POST {api_base}/chat/completions` for the image description
//! - `POST {api_base}/images/generations` for the image itself
//!
//! The pipeline only sees the [`GenerationClient`] trait, so tests and other
//! providers can stand in for [`OpenAiClient`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("Provider response contained no {0}")]
    EmptyResponse(&'static str),
}

/// Text and image generation, as consumed by the pipeline.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// One chat completion; returns the trimmed reply text.
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError>;

    /// Generate `count` images of `size` and return the URL of the first.
    async fn generate_image(
        &self,
        prompt: &str,
        count: u32,
        size: &str,
    ) -> Result<String, GenerationError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u32,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    chat_model: String,
}

impl OpenAiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            chat_model: chat_model.into(),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GenerationError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| {
                    if text.is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_string()
                    } else {
                        text
                    }
                });
            return Err(GenerationError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };
        let response: ChatResponse = self.post("/chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(GenerationError::EmptyResponse("completion text"))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        count: u32,
        size: &str,
    ) -> Result<String, GenerationError> {
        let request = ImageRequest {
            prompt,
            n: count,
            size,
        };
        let response: ImageResponse = self.post("/images/generations", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or(GenerationError::EmptyResponse("image URL"))
    }
}
