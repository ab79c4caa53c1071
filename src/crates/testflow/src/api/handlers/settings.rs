//! Concurrency settings and test taxonomy

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::api::{
    error::{ApiError, ApiResult},
    models::ActiveOnlyQuery,
    response,
    routes::AppState,
};
use crate::db::repositories::SettingsRepository;
use crate::tasks::ConcurrencyConfig;

/// GET /api/v1/settings/concurrency
///
/// Reports the live gate configuration.
pub async fn get_concurrency(State(app_state): State<AppState>) -> impl IntoResponse {
    response::ok(app_state.runner.registry().gate().config())
}

/// PUT /api/v1/settings/concurrency
///
/// Persists the new limits and applies them to the running gate.
pub async fn update_concurrency(
    State(app_state): State<AppState>,
    Json(config): Json<ConcurrencyConfig>,
) -> ApiResult<impl IntoResponse> {
    config.validate().map_err(ApiError::ValidationError)?;

    SettingsRepository::save_concurrency(app_state.db.pool(), &config).await?;
    app_state.runner.registry().gate().update(config.clone());
    app_state.runner.on_config_changed();

    tracing::info!(
        max_concurrent = config.max_concurrent_tasks,
        queue_size = config.queue_size,
        retry_count = config.retry_count,
        "Concurrency settings updated"
    );
    Ok(response::ok(config))
}

/// GET /api/v1/settings/test-categories
pub async fn list_categories(
    State(app_state): State<AppState>,
    Query(query): Query<ActiveOnlyQuery>,
) -> ApiResult<impl IntoResponse> {
    let categories =
        SettingsRepository::list_categories(app_state.db.pool(), query.active_only).await?;
    Ok(response::ok(categories))
}

/// GET /api/v1/settings/design-methods
pub async fn list_design_methods(
    State(app_state): State<AppState>,
    Query(query): Query<ActiveOnlyQuery>,
) -> ApiResult<impl IntoResponse> {
    let methods =
        SettingsRepository::list_design_methods(app_state.db.pool(), query.active_only).await?;
    Ok(response::ok(methods))
}
