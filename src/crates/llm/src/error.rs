//! Error types for the chat client.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when talking to an OpenAI-compatible endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed (HTTP 401).
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Upstream answered with a non-success status.
    #[error("API error {status}: {body}")]
    RequestFailed { status: u16, body: String },

    /// The stream completed but the content is unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// The upstream reported an error inside the event stream.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Local I/O failure, e.g. reading an image attachment.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(_)
            | LlmError::Timeout(_)
            | LlmError::RateLimitExceeded(_)
            | LlmError::InvalidResponse(_)
            | LlmError::ProviderError(_) => true,
            LlmError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::AuthenticationError(_))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Timeout("slow".into()).is_retryable());
        assert!(LlmError::RateLimitExceeded("busy".into()).is_retryable());
        assert!(LlmError::RequestFailed { status: 502, body: String::new() }.is_retryable());
        assert!(!LlmError::RequestFailed { status: 400, body: String::new() }.is_retryable());
        assert!(!LlmError::AuthenticationError("bad key".into()).is_retryable());
    }

    #[test]
    fn test_auth_error() {
        assert!(LlmError::AuthenticationError("bad key".into()).is_auth_error());
        assert!(!LlmError::Timeout("slow".into()).is_auth_error());
    }
}
