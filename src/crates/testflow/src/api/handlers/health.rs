//! Health check endpoint handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::api::{models::HealthResponse, response, routes::AppState};

/// Handler for GET /health
///
/// Returns basic health status without database check.
pub async fn health() -> impl IntoResponse {
    response::ok(HealthResponse::new("ok", "unknown"))
}

/// Handler for GET /api/v1/system/health
///
/// Checks the database and reports the task queue.
pub async fn health_detailed(
    State(app_state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let queue = app_state.runner.registry().queue_info();
    match app_state.db.health_check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("ok", "connected").with_queue(queue))),
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("error", "error").with_queue(queue)),
            )
        }
    }
}
