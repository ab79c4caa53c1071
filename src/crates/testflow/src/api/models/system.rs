//! Health, task control and query parameter bodies

use crate::tasks::QueueInfo;
use serde::{Deserialize, Serialize};

/// System health response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: String,
    /// Database connection status
    pub database: String,
    /// API version
    pub version: String,
    /// Current timestamp
    pub timestamp: String,
    /// Task gate occupancy, on the detailed endpoint only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueInfo>,
}

impl HealthResponse {
    pub fn new(status: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            database: database.into(),
            version: crate::version::VERSION.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: QueueInfo) -> Self {
        self.queue = Some(queue);
        self
    }
}

/// Body of `GET /tasks/queue`
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    #[serde(flatten)]
    pub info: QueueInfo,
    /// Task that takes the next free slot
    pub next_task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveOnlyQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}
