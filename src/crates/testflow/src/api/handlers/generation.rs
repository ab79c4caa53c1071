//! Asynchronous generation launches
//!
//! Every launch answers 202 with the task id; progress is polled through
//! the task status endpoint.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::{
    error::ApiResult,
    models::{
        LaunchResponse, OneClickBody, RequirementAnalysisRequest, TestCaseDesignRequest,
        TestCaseOptimizationRequest, TestPointGenerationRequest,
    },
    response,
    routes::AppState,
};

/// POST /api/v1/agents/requirement-analysis/async
pub async fn requirement_analysis(
    State(app_state): State<AppState>,
    Json(req): Json<RequirementAnalysisRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let submission = app_state
        .generation
        .launch_requirement_analysis(req.requirement_content, req.agent_id, req.image_paths)
        .await?;
    Ok(response::accepted(LaunchResponse::from(submission)))
}

/// POST /api/v1/agents/test-point-generation/async
pub async fn test_point_generation(
    State(app_state): State<AppState>,
    Json(req): Json<TestPointGenerationRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let submission = app_state
        .generation
        .launch_test_point_generation(req.requirement_points, req.agent_id, req.module_id)
        .await?;
    Ok(response::accepted(LaunchResponse::from(submission)))
}

/// POST /api/v1/agents/test-case-design/async
pub async fn test_case_design(
    State(app_state): State<AppState>,
    Json(req): Json<TestCaseDesignRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let submission = app_state
        .generation
        .launch_test_case_design(req.test_points, req.agent_id, req.module_id)
        .await?;
    Ok(response::accepted(LaunchResponse::from(submission)))
}

/// POST /api/v1/agents/test-case-optimization/async
pub async fn test_case_optimization(
    State(app_state): State<AppState>,
    Json(req): Json<TestCaseOptimizationRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    let submission = app_state
        .generation
        .launch_test_case_optimization(req.test_cases, req.agent_id, req.auto_save)
        .await?;
    Ok(response::accepted(LaunchResponse::from(submission)))
}

/// POST /api/v1/requirements/files/:file_id/generate
pub async fn one_click(
    State(app_state): State<AppState>,
    Path(file_id): Path<i64>,
    body: Option<Json<OneClickBody>>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = body.unwrap_or_default();
    let submission = app_state
        .generation
        .launch_one_click(file_id, body.agent_ids, body.image_paths)
        .await?;
    Ok(response::accepted(LaunchResponse::from(submission)))
}
