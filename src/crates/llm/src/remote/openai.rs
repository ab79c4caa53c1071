//! OpenAI-compatible chat completion client.
//!
//! Every request is sent with `stream: true` and the deltas are accumulated
//! into one string. Long generations therefore keep the connection busy
//! instead of idling until the whole answer is ready.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{ChatClient, ChatMessage, ChatRequest, OpenAiClient, RemoteLlmConfig};
//!
//! let config = RemoteLlmConfig::new(api_key, "https://api.openai.com", "gpt-4o");
//! let client = OpenAiClient::new(config)?;
//!
//! let text = client
//!     .chat(ChatRequest::new(vec![ChatMessage::user("Hello!")]))
//!     .await?;
//! ```

use crate::client::ChatClient;
use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::message::{ChatMessage, ChatRequest};
use crate::sse::{SseDecoder, SseEvent};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Responses shorter than this (after trimming) are treated as unusable.
pub const MIN_CONTENT_LEN: usize = 10;

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RemoteLlmConfig {
        &self.config
    }

    fn build_body<'a>(&'a self, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiClient {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let url = self.config.chat_completions_url();
        let body = self.build_body(&request);

        let req = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Accept", "text/event-stream")
            .json(&body);

        debug!(model = %self.config.model, url = %url, "Sending streaming chat request");

        let response = req.send().await.map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();

            return Err(match status {
                401 => LlmError::AuthenticationError(error_text),
                429 => LlmError::RateLimitExceeded(error_text),
                _ => LlmError::RequestFailed {
                    status,
                    body: error_text,
                },
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut content = String::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_transport_error)?;
            for event in decoder.push(&chunk) {
                if !apply_event(event, &mut content)? {
                    break 'read;
                }
            }
        }
        if let Some(event) = decoder.finish() {
            apply_event(event, &mut content)?;
        }

        let length = content.trim().chars().count();
        if length < MIN_CONTENT_LEN {
            return Err(LlmError::InvalidResponse(format!(
                "content too short ({} chars)",
                length
            )));
        }

        debug!(model = %self.config.model, chars = content.len(), "Streaming chat completed");
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Fold one event into the accumulated text. Returns `false` at end of stream.
fn apply_event(event: SseEvent, content: &mut String) -> Result<bool> {
    match event {
        SseEvent::Done => Ok(false),
        SseEvent::Data(data) => {
            let chunk: OpenAiStreamChunk = match serde_json::from_str(&data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable stream chunk");
                    return Ok(true);
                }
            };

            if let Some(error) = chunk.error {
                return Err(LlmError::ProviderError(error.message));
            }

            if let Some(delta) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            {
                content.push_str(&delta);
            }
            Ok(true)
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout(err.to_string())
    } else {
        LlmError::HttpError(err)
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<OpenAiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    #[serde(default)]
    message: String,
}
