//! Task status and control handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    models::{CancelResponse, QueueStatus},
    routes::AppState,
};

/// GET /api/v1/tasks/:id/status
pub async fn get_task_status(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let snapshot = app_state
        .runner
        .registry()
        .get_status(&task_id)
        .ok_or_else(|| ApiError::NotFound(format!("Task not found: {}", task_id)))?;
    Ok(Json(snapshot))
}

/// POST /api/v1/tasks/:id/cancel
pub async fn cancel_task(
    State(app_state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    app_state.runner.cancel(&task_id)?;
    tracing::info!(task_id = %task_id, "Task cancelled");
    Ok(Json(CancelResponse {
        success: true,
        message: "Task cancelled".to_string(),
    }))
}

/// GET /api/v1/tasks/queue
pub async fn queue_info(State(app_state): State<AppState>) -> impl IntoResponse {
    let registry = app_state.runner.registry();
    crate::api::response::ok(QueueStatus {
        info: registry.queue_info(),
        next_task_id: registry.next_pending(),
    })
}
