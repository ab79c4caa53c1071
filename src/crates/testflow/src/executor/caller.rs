//! One logical LLM call: chat, extract JSON, retry on failure.

use super::config::ExecutorConfig;
use super::parser::JsonExtractor;
use super::retry::{retry_with_backoff, RetryConfig};
use super::ExecutorError;
use llm::{chat_with_fallback, ChatClient, ChatRequest};
use serde_json::Value;

/// Runs chat requests that are expected to answer with a JSON object.
///
/// A response without recoverable JSON counts as a failed attempt, the same
/// as a timeout or a transport error.
#[derive(Debug, Clone)]
pub struct LlmCaller {
    retry: RetryConfig,
    extractor: JsonExtractor,
}

impl LlmCaller {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            retry: config.retry_config(),
            extractor: config.extractor(),
        }
    }

    pub fn from_parts(retry: RetryConfig, extractor: JsonExtractor) -> Self {
        Self { retry, extractor }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn call_json(
        &self,
        client: &dyn ChatClient,
        request: &ChatRequest,
        operation: &str,
    ) -> Result<Value, ExecutorError> {
        let extractor = &self.extractor;
        retry_with_backoff(&self.retry, operation, move || async move {
            let text = chat_with_fallback(client, request.clone()).await?;
            extractor.extract(&text).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::{ChatMessage, LlmError};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn chat(&self, _request: ChatRequest) -> llm::Result<String> {
            *self.calls.lock() += 1;
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::ProviderError("script exhausted".into())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    fn caller(retries: u32) -> LlmCaller {
        LlmCaller::from_parts(
            RetryConfig::new(retries).with_initial_backoff(1),
            JsonExtractor::new(),
        )
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("split this")])
    }

    #[tokio::test]
    async fn test_parse_failure_is_retried() {
        let client = ScriptedClient::new(vec![
            Ok("Sorry, here you go: nothing".to_string()),
            Ok("```json\n{\"requirement_points\": []}\n```".to_string()),
        ]);

        let value = caller(3).call_json(&client, &request(), "analyze").await.unwrap();
        assert_eq!(value, json!({"requirement_points": []}));
        assert_eq!(*client.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let client = ScriptedClient::new(vec![
            Err(LlmError::Timeout("slow".into())),
            Err(LlmError::RequestFailed { status: 502, body: "bad gateway".into() }),
            Ok("{\"ok\": true}".to_string()),
        ]);

        let value = caller(3).call_json(&client, &request(), "op").await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(*client.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let client = ScriptedClient::new(vec![
            Ok("nope".to_string()),
            Ok("still nope".to_string()),
        ]);

        let err = caller(1).call_json(&client, &request(), "op").await.unwrap_err();
        assert!(err.to_string().starts_with("failed after 1 retries"));
        assert_eq!(*client.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_auth_error_stops_immediately() {
        let client =
            ScriptedClient::new(vec![Err(LlmError::AuthenticationError("bad key".into()))]);

        let err = caller(3).call_json(&client, &request(), "op").await.unwrap_err();
        assert!(matches!(err, ExecutorError::Llm(LlmError::AuthenticationError(_))));
        assert_eq!(*client.calls.lock(), 1);
    }
}
