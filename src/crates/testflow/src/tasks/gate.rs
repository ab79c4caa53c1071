//! Admission gate
//!
//! Advisory bookkeeping that decides whether one more task may run. The
//! limits live behind a shared lock so the settings API can swap them while
//! the server is running; a lowered limit only blocks new admissions.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Concurrency settings for generation tasks.
///
/// Stored as JSON in the `system_configs` row keyed `concurrency_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Maximum number of RUNNING tasks (1-10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Per-call timeout in seconds (60-600)
    #[serde(default = "default_task_timeout")]
    pub task_timeout: u64,

    /// Retries after the first attempt of each LLM call (0-5)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Wait queue capacity (10-1000)
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

fn default_max_concurrent() -> usize {
    3
}

fn default_task_timeout() -> u64 {
    300
}

fn default_retry_count() -> u32 {
    3
}

fn default_queue_size() -> usize {
    100
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            task_timeout: default_task_timeout(),
            retry_count: default_retry_count(),
            queue_size: default_queue_size(),
        }
    }
}

impl ConcurrencyConfig {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.max_concurrent_tasks) {
            return Err(format!(
                "max_concurrent_tasks must be between 1 and 10, got {}",
                self.max_concurrent_tasks
            ));
        }
        if !(60..=600).contains(&self.task_timeout) {
            return Err(format!(
                "task_timeout must be between 60 and 600 seconds, got {}",
                self.task_timeout
            ));
        }
        if self.retry_count > 5 {
            return Err(format!(
                "retry_count must be between 0 and 5, got {}",
                self.retry_count
            ));
        }
        if !(10..=1000).contains(&self.queue_size) {
            return Err(format!(
                "queue_size must be between 10 and 1000, got {}",
                self.queue_size
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }
}

/// Shared, hot-reloadable admission limits.
#[derive(Debug, Clone, Default)]
pub struct AdmissionGate {
    config: Arc<RwLock<ConcurrencyConfig>>,
}

impl AdmissionGate {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Current settings snapshot.
    pub fn config(&self) -> ConcurrencyConfig {
        self.config.read().clone()
    }

    /// Replace the settings. Takes effect for the next admission decision.
    pub fn update(&self, config: ConcurrencyConfig) {
        *self.config.write() = config;
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.read().max_concurrent_tasks.max(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.config.read().queue_size
    }

    /// True iff `running` is below the concurrency limit.
    pub fn can_start(&self, running: usize) -> bool {
        running < self.max_concurrent()
    }

    /// True iff the wait queue can take one more task.
    pub fn can_enqueue(&self, queued: usize) -> bool {
        queued < self.queue_capacity()
    }
}
