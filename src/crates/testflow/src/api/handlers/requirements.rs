//! Requirement files and the generated assets of a module

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::validation::validate_not_empty,
    response,
    routes::AppState,
};
use crate::db::models::NewRequirementFile;
use crate::db::repositories::{RequirementRepository, TestCaseRepository, TestPointRepository};

/// POST /api/v1/requirements/files
pub async fn create_file(
    State(app_state): State<AppState>,
    Json(req): Json<NewRequirementFile>,
) -> ApiResult<impl IntoResponse> {
    validate_not_empty(&req.filename, "filename")?;
    let file = RequirementRepository::create_file(app_state.db.pool(), &req).await?;
    tracing::info!(file_id = file.id, filename = %file.filename, "Registered requirement file");
    Ok(response::created(file))
}

/// GET /api/v1/requirements/files/:file_id
pub async fn get_file(
    State(app_state): State<AppState>,
    Path(file_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let file = RequirementRepository::get_file(app_state.db.pool(), file_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Requirement file {} not found", file_id)))?;
    Ok(response::ok(file))
}

/// GET /api/v1/requirements/files/:file_id/points
pub async fn list_points(
    State(app_state): State<AppState>,
    Path(file_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let points = RequirementRepository::list_points_by_file(app_state.db.pool(), file_id).await?;
    Ok(response::ok(points))
}

/// GET /api/v1/modules/:module_id/test-points
pub async fn module_test_points(
    State(app_state): State<AppState>,
    Path(module_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let points = TestPointRepository::list_by_module(app_state.db.pool(), module_id).await?;
    Ok(response::ok(points))
}

/// GET /api/v1/modules/:module_id/test-cases
pub async fn module_test_cases(
    State(app_state): State<AppState>,
    Path(module_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let cases = TestCaseRepository::list_by_module(app_state.db.pool(), module_id).await?;
    Ok(response::ok(cases))
}
