//! Retry logic for LLM calls
//!
//! Exponential backoff with an optional per-attempt timeout. A timed out
//! attempt counts as one failed attempt; only permanent errors (bad
//! credentials, rejected requests) stop the loop early.

use super::ExecutorError;
use llm::LlmError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Classification of errors for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient errors that may succeed on retry (rate limits, timeouts, 5xx, bad JSON)
    Transient,

    /// Permanent errors that won't succeed on retry (invalid auth, 4xx)
    Permanent,

    /// Unknown errors - treated as transient
    Unknown,
}

/// Retry strategy configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Whether to add random jitter to backoff delays
    pub jitter: bool,

    /// Upper bound for a single attempt
    #[serde(default)]
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: false,
            attempt_timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom max retries
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set initial backoff delay
    pub fn with_initial_backoff(mut self, ms: u64) -> Self {
        self.initial_backoff_ms = ms;
        self
    }

    /// Set maximum backoff delay
    pub fn with_max_backoff(mut self, ms: u64) -> Self {
        self.max_backoff_ms = ms;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Bound every attempt by `timeout`, or remove the bound with `None`
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Calculate backoff delay for a given attempt
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u64;

        let delay_ms = delay_ms.min(self.max_backoff_ms);

        let delay_ms = if self.jitter {
            // Add up to 25% random jitter
            let jitter_amount = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter_amount
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// Classify an error to determine if it should be retried
pub fn classify_error(error: &ExecutorError) -> ErrorClass {
    match error {
        ExecutorError::Timeout(_) | ExecutorError::Parse(_) => ErrorClass::Transient,
        ExecutorError::Llm(e) if e.is_auth_error() => ErrorClass::Permanent,
        ExecutorError::Llm(e) if e.is_retryable() => ErrorClass::Transient,
        ExecutorError::Llm(LlmError::RequestFailed { status, .. })
            if (400..500).contains(status) =>
        {
            ErrorClass::Permanent
        }
        ExecutorError::Llm(LlmError::ConfigError(_)) => ErrorClass::Permanent,
        _ => ErrorClass::Unknown,
    }
}

/// Execute an async operation with retry logic
///
/// Runs at most `max_retries + 1` attempts. After the last failed attempt the
/// error is [`ExecutorError::RetriesExhausted`], carrying the retry count and
/// the final cause.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutorError>>,
{
    let mut last_error: Option<ExecutorError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            info!(
                operation = operation_name,
                attempt = attempt,
                max_retries = config.max_retries,
                "Retrying operation"
            );
        }

        let outcome = match config.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, f()).await {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout(limit)),
            },
            None => f().await,
        };

        match outcome {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                let error_class = classify_error(&e);

                debug!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %e,
                    classification = ?error_class,
                    "Operation failed"
                );

                if error_class == ErrorClass::Permanent {
                    error!(
                        operation = operation_name,
                        error = %e,
                        "Permanent error detected, aborting retries"
                    );
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < config.max_retries {
                    let delay = config.backoff_delay(attempt);

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, will retry after delay"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let last_error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempt was made".to_string());

    error!(
        operation = operation_name,
        max_retries = config.max_retries,
        error = %last_error,
        "All retry attempts exhausted"
    );

    Err(ExecutorError::RetriesExhausted {
        retries: config.max_retries,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .with_initial_backoff(10)
            .with_jitter(false)
    }

    type Attempt = std::pin::Pin<Box<dyn Future<Output = Result<i32, ExecutorError>> + Send>>;

    /// Operation that fails `failures` times with a parse error, then returns 42.
    fn flaky(failures: u32, counter: Arc<Mutex<u32>>) -> impl FnMut() -> Attempt {
        move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let mut c = counter.lock().unwrap();
                *c += 1;
                if *c <= failures {
                    Err(ExecutorError::Parse("not json".to_string()))
                } else {
                    Ok(42)
                }
            })
        }
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 1000);
        assert_eq!(config.max_backoff_ms, 60_000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(!config.jitter);
        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_backoff_delay_exponential() {
        let config = RetryConfig::new(3).with_initial_backoff(1000);

        assert_eq!(config.backoff_delay(0).as_millis(), 1000);
        assert_eq!(config.backoff_delay(1).as_millis(), 2000);
        assert_eq!(config.backoff_delay(2).as_millis(), 4000);
    }

    #[test]
    fn test_backoff_delay_max_cap() {
        let config = RetryConfig::new(10)
            .with_initial_backoff(1000)
            .with_max_backoff(5000);

        assert_eq!(config.backoff_delay(5).as_millis(), 5000);
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = RetryConfig::new(3).with_initial_backoff(1000).with_jitter(true);
        for _ in 0..20 {
            let delay = config.backoff_delay(1).as_millis();
            assert!((2000..=2500).contains(&delay));
        }
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(
            classify_error(&ExecutorError::Timeout(Duration::from_secs(1))),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_error(&ExecutorError::Parse("x".into())),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_error(&ExecutorError::Llm(LlmError::AuthenticationError("bad".into()))),
            ErrorClass::Permanent
        );
        assert_eq!(
            classify_error(&ExecutorError::Llm(LlmError::RequestFailed {
                status: 400,
                body: "context too long".into()
            })),
            ErrorClass::Permanent
        );
        assert_eq!(
            classify_error(&ExecutorError::Llm(LlmError::RequestFailed {
                status: 503,
                body: String::new()
            })),
            ErrorClass::Transient
        );
        assert_eq!(
            classify_error(&ExecutorError::Llm(LlmError::RateLimitExceeded("slow down".into()))),
            ErrorClass::Transient
        );
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let counter = Arc::new(Mutex::new(0));
        let result = retry_with_backoff(&fast(3), "op", flaky(0, counter.clone())).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_succeeds_when_failures_below_retry_count() {
        for failures in 0..3 {
            let counter = Arc::new(Mutex::new(0));
            let result = retry_with_backoff(&fast(3), "op", flaky(failures, counter.clone())).await;

            assert_eq!(result.unwrap(), 42);
            assert_eq!(*counter.lock().unwrap(), failures + 1);
        }
    }

    #[tokio::test]
    async fn test_retry_exhausted_mentions_retry_count() {
        let counter = Arc::new(Mutex::new(0));
        let result = retry_with_backoff(&fast(2), "op", flaky(10, counter.clone())).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ExecutorError::RetriesExhausted { retries: 2, .. }));
        assert!(err.to_string().contains("failed after 2 retries"));
        assert!(err.to_string().contains("not json"));
        assert_eq!(*counter.lock().unwrap(), 3); // Initial + 2 retries
    }

    #[tokio::test]
    async fn test_retry_abort_on_permanent_error() {
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = Arc::clone(&counter);

        let result: Result<(), ExecutorError> = retry_with_backoff(&fast(3), "op", move || {
            let count = Arc::clone(&counter_clone);
            async move {
                *count.lock().unwrap() += 1;
                Err(ExecutorError::Llm(LlmError::AuthenticationError("401".into())))
            }
        })
        .await;

        assert!(matches!(result, Err(ExecutorError::Llm(_))));
        assert_eq!(*counter.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_consumes_one_attempt() {
        let counter = Arc::new(Mutex::new(0u32));
        let counter_clone = Arc::clone(&counter);
        let config = RetryConfig::new(2)
            .with_initial_backoff(1000)
            .with_attempt_timeout(Some(Duration::from_secs(5)));

        let result = retry_with_backoff(&config, "op", move || {
            let count = Arc::clone(&counter_clone);
            async move {
                let attempt = {
                    let mut c = count.lock().unwrap();
                    *c += 1;
                    *c
                };
                if attempt == 1 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, ExecutorError>(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(*counter.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let counter = Arc::new(Mutex::new(0));
        let config = RetryConfig::new(3).with_initial_backoff(1000);
        let started = tokio::time::Instant::now();

        let result = retry_with_backoff(&config, "op", flaky(3, counter.clone())).await;

        assert_eq!(result.unwrap(), 42);
        // 1s + 2s + 4s of backoff before the fourth attempt
        assert!(started.elapsed() >= Duration::from_secs(7));
    }
}
