//! Connection settings for an OpenAI-compatible endpoint.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a remote chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    ///
    /// `/v1` is appended when missing, so both `https://api.openai.com` and
    /// `https://api.openai.com/v1` are accepted.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Whole-request timeout, including the time spent reading the stream.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl RemoteLlmConfig {
    /// Create a new remote LLM configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint for chat completions, with the base URL normalized to end in `/v1`.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", normalize_base_url(&self.base_url))
    }
}

/// Trim trailing slashes and make sure the URL ends with `/v1`.
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(300)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://api.openai.com"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("https://api.openai.com/v1"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("http://localhost:1234/"), "http://localhost:1234/v1");
    }

    #[test]
    fn test_chat_completions_url() {
        let config = RemoteLlmConfig::new("key", "https://example.com/", "m");
        assert_eq!(config.chat_completions_url(), "https://example.com/v1/chat/completions");
    }

    #[test]
    fn test_builders() {
        let config = RemoteLlmConfig::new("key", "https://example.com", "m")
            .with_timeout(Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.model, "m");
    }
}
