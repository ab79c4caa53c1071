//! Stage execution log rows

use serde::Serialize;
use sqlx::FromRow;

/// One finished stage run launched through the API.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskLog {
    pub id: i64,
    pub task_id: Option<String>,
    pub agent_id: Option<i64>,
    pub task_type: String,
    pub status: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: String,
}

/// Fields of a log row before insertion.
#[derive(Debug, Clone, Default)]
pub struct NewTaskLog {
    pub task_id: Option<String>,
    pub agent_id: Option<i64>,
    pub task_type: String,
    pub status: String,
    pub input_summary: Option<String>,
    pub output_summary: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}
