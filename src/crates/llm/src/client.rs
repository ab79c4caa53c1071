use crate::error::Result;
use crate::message::ChatRequest;
use async_trait::async_trait;

/// A chat completion backend that returns the full text of one answer.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run one completion and return the accumulated assistant text.
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Model identifier used for requests.
    fn model(&self) -> &str;
}
