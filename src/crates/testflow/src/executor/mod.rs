//! LLM call execution
//!
//! Retry with exponential backoff, JSON extraction from model output, and
//! concurrent batch dispatch with progress callbacks.

pub mod batch;
pub mod caller;
pub mod config;
pub mod parser;
pub mod retry;

pub use batch::{batch_count, partition, run_batches, BatchFailure, BatchReport, ProgressSpan};
pub use caller::LlmCaller;
pub use config::ExecutorConfig;
pub use parser::{ExtractionPath, JsonExtractor};
pub use retry::{classify_error, retry_with_backoff, ErrorClass, RetryConfig};

use std::time::Duration;
use thiserror::Error;

/// Errors from a single LLM call and its retries.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] llm::LlmError),

    #[error("LLM call timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Failed to parse JSON: {0}")]
    Parse(String),

    #[error("failed after {retries} retries: {last_error}")]
    RetriesExhausted { retries: u32, last_error: String },
}
