//! Task log repository

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{NewTaskLog, TaskLog};
use chrono::Utc;

pub struct TaskLogRepository;

impl TaskLogRepository {
    pub async fn insert(pool: &DatabasePool, log: &NewTaskLog) -> DbResult<i64> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO task_logs (task_id, agent_id, task_type, status, input_summary, \
             output_summary, error_message, duration_ms, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&log.task_id)
        .bind(log.agent_id)
        .bind(&log.task_type)
        .bind(&log.status)
        .bind(&log.input_summary)
        .bind(&log.output_summary)
        .bind(&log.error_message)
        .bind(log.duration_ms)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Most recent rows first.
    pub async fn list_recent(pool: &DatabasePool, limit: i64) -> DbResult<Vec<TaskLog>> {
        let rows = sqlx::query_as::<_, TaskLog>(
            "SELECT id, task_id, agent_id, task_type, status, input_summary, output_summary, \
             error_message, duration_ms, created_at FROM task_logs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
