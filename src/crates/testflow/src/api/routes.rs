//! API route definitions

use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{handlers, middleware};
use crate::config::{security_middleware, SecurityState};
use crate::db::DatabaseConnection;
use crate::services::GenerationService;
use crate::tasks::TaskRunner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub runner: Arc<TaskRunner>,
    pub generation: GenerationService,
    pub security: Arc<SecurityState>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        generation: GenerationService,
        security: Arc<SecurityState>,
    ) -> Self {
        Self {
            db,
            runner: Arc::clone(generation.runner()),
            generation,
            security,
        }
    }
}

/// Build the complete API router
///
/// `/health` stays open; everything under `/api/v1` passes the security check.
pub fn create_router(app_state: AppState, cors_origins: &[String]) -> Router {
    let security = Arc::clone(&app_state.security);

    let api = Router::new()
        .route("/system/health", get(handlers::health::health_detailed))
        // Generation launches
        .route(
            "/agents/requirement-analysis/async",
            post(handlers::generation::requirement_analysis),
        )
        .route(
            "/agents/test-point-generation/async",
            post(handlers::generation::test_point_generation),
        )
        .route(
            "/agents/test-case-design/async",
            post(handlers::generation::test_case_design),
        )
        .route(
            "/agents/test-case-optimization/async",
            post(handlers::generation::test_case_optimization),
        )
        .route(
            "/requirements/files/:file_id/generate",
            post(handlers::generation::one_click),
        )
        // Tasks
        .route("/tasks/queue", get(handlers::tasks::queue_info))
        .route("/tasks/:id/status", get(handlers::tasks::get_task_status))
        .route("/tasks/:id/cancel", post(handlers::tasks::cancel_task))
        // Requirement files and generated assets
        .route("/requirements/files", post(handlers::requirements::create_file))
        .route("/requirements/files/:file_id", get(handlers::requirements::get_file))
        .route(
            "/requirements/files/:file_id/points",
            get(handlers::requirements::list_points),
        )
        .route(
            "/modules/:module_id/test-points",
            get(handlers::requirements::module_test_points),
        )
        .route(
            "/modules/:module_id/test-cases",
            get(handlers::requirements::module_test_cases),
        )
        // Settings
        .route(
            "/settings/concurrency",
            get(handlers::settings::get_concurrency).put(handlers::settings::update_concurrency),
        )
        .route("/settings/test-categories", get(handlers::settings::list_categories))
        .route("/settings/design-methods", get(handlers::settings::list_design_methods))
        // Models and agents
        .route(
            "/ai-models",
            get(handlers::ai_config::list_models).post(handlers::ai_config::create_model),
        )
        .route(
            "/agents",
            get(handlers::ai_config::list_agents).post(handlers::ai_config::create_agent),
        )
        .route("/agents/types", get(handlers::ai_config::agent_types))
        .route("/agents/task-logs", get(handlers::ai_config::task_logs))
        .layer(from_fn(move |request: Request, next: Next| {
            security_middleware(Arc::clone(&security), request, next)
        }));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api/v1", api)
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer(cors_origins))
        .with_state(app_state)
}
