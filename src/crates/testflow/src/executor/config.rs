//! Executor Configuration
//!
//! Knobs for a single LLM call: how many times to retry, how long each attempt
//! may take, the backoff base, and where unparseable responses are kept.

use super::parser::JsonExtractor;
use super::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Additional attempts after the first
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Backoff base; attempt n waits `base * 2^n`
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Directory for `failed_response_*.txt` side logs
    #[serde(default)]
    pub failed_response_dir: Option<PathBuf>,
}

fn default_retry_count() -> u32 {
    3
}

fn default_call_timeout() -> u64 {
    300
}

fn default_retry_base_delay() -> u64 {
    1000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            call_timeout_secs: default_call_timeout(),
            retry_base_delay_ms: default_retry_base_delay(),
            failed_response_dir: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    pub fn with_retry_base_delay(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = ms;
        self
    }

    pub fn with_failed_response_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failed_response_dir = Some(dir.into());
        self
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.retry_count)
            .with_initial_backoff(self.retry_base_delay_ms)
            .with_jitter(false)
            .with_attempt_timeout(Some(Duration::from_secs(self.call_timeout_secs)))
    }

    pub fn extractor(&self) -> JsonExtractor {
        match &self.failed_response_dir {
            Some(dir) => JsonExtractor::new().with_failure_log_dir(dir),
            None => JsonExtractor::new(),
        }
    }
}
