//! Model endpoints, stage agents and task logs

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{
    error::{ApiError, ApiResult},
    middleware::validation::{validate_limit, validate_not_empty},
    models::LimitQuery,
    response,
    routes::AppState,
};
use crate::db::models::{NewAgent, NewAiModel};
use crate::db::repositories::{AgentRepository, AiModelRepository, TaskLogRepository};
use crate::pipeline::AgentKind;

const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct AgentListQuery {
    #[serde(rename = "type")]
    pub agent_type: Option<AgentKind>,
}

#[derive(Debug, Serialize)]
pub struct AgentTypeInfo {
    pub value: AgentKind,
    pub label: &'static str,
}

/// GET /api/v1/ai-models
pub async fn list_models(State(app_state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let models = AiModelRepository::list(app_state.db.pool()).await?;
    Ok(response::ok(models))
}

/// POST /api/v1/ai-models
pub async fn create_model(
    State(app_state): State<AppState>,
    Json(req): Json<NewAiModel>,
) -> ApiResult<impl IntoResponse> {
    validate_not_empty(&req.name, "name")?;
    validate_not_empty(&req.model_id, "model_id")?;
    let model = AiModelRepository::create(app_state.db.pool(), &req).await?;
    tracing::info!(model_id = model.id, name = %model.name, "Created AI model");
    Ok(response::created(model))
}

/// GET /api/v1/agents
pub async fn list_agents(
    State(app_state): State<AppState>,
    Query(query): Query<AgentListQuery>,
) -> ApiResult<impl IntoResponse> {
    let agents = AgentRepository::list(app_state.db.pool(), query.agent_type).await?;
    Ok(response::ok(agents))
}

/// POST /api/v1/agents
pub async fn create_agent(
    State(app_state): State<AppState>,
    Json(req): Json<NewAgent>,
) -> ApiResult<impl IntoResponse> {
    validate_not_empty(&req.name, "name")?;
    if let Some(model_id) = req.ai_model_id {
        if AiModelRepository::get(app_state.db.pool(), model_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("AI model {} does not exist", model_id)));
        }
    }
    let agent = AgentRepository::create(app_state.db.pool(), &req).await?;
    tracing::info!(agent_id = agent.id, agent_type = %agent.agent_type, "Created agent");
    Ok(response::created(agent))
}

/// GET /api/v1/agents/types
pub async fn agent_types() -> impl IntoResponse {
    let types: Vec<AgentTypeInfo> = AgentKind::all()
        .into_iter()
        .map(|kind| AgentTypeInfo {
            value: kind,
            label: kind.label(),
        })
        .collect();
    response::ok(types)
}

/// GET /api/v1/agents/task-logs
pub async fn task_logs(
    State(app_state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<impl IntoResponse> {
    validate_limit(query.limit, MAX_LOG_LIMIT)?;
    let logs = TaskLogRepository::list_recent(app_state.db.pool(), query.limit).await?;
    Ok(response::ok(logs))
}
