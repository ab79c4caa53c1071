//! HTTP surface driven in process through the router.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{database, seed_agents, service};
use serde_json::{json, Value};
use std::sync::Arc;
use testflow::api::{create_router, AppState};
use testflow::config::{SecurityConfig, SecurityMode, SecurityState};
use testflow::db::DatabaseConnection;
use testflow::pipeline::AgentKind;
use testflow::tasks::{ConcurrencyConfig, TaskType};
use tower::ServiceExt;

async fn app_with(security: SecurityState) -> (Router, DatabaseConnection) {
    let db = database().await;
    seed_agents(&db).await;
    let generation = service(
        &db,
        ConcurrencyConfig::default(),
        Arc::new(|_: AgentKind, _: &str| -> llm::Result<String> {
            Ok(json!({"requirement_points": [{"content": "x"}]}).to_string())
        }),
    );
    let state = AppState::new(db.clone(), generation, Arc::new(security));
    (create_router(state, &[]), db)
}

async fn app() -> Router {
    app_with(SecurityState::open()).await.0
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn unknown_task_is_404() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/v1/tasks/nope/status", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, "POST", "/api/v1/tasks/nope/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn launch_poll_and_cancel() {
    let app = app().await;
    let (status, launched) = send(
        &app,
        "POST",
        "/api/v1/agents/requirement-analysis/async",
        Some(json!({"requirement_content": "Users can log in"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let task_id = launched["task_id"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/tasks/{}/status", task_id);
    let mut finished = Value::Null;
    for _ in 0..200 {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            finished = body;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(finished["task_type"], "requirement_analysis");
    assert_eq!(finished["progress"], 100);
    assert!(finished["result"].is_object());

    let cancel = format!("/api/v1/tasks/{}/cancel", task_id);
    let (status, body) = send(&app, "POST", &cancel, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn queue_names_the_next_waiting_task() {
    let db = database().await;
    let config = ConcurrencyConfig {
        max_concurrent_tasks: 1,
        ..Default::default()
    };
    let generation = service(
        &db,
        config,
        Arc::new(|_: AgentKind, _: &str| -> llm::Result<String> { Ok("{}".to_string()) }),
    );
    let state = AppState::new(db, generation, Arc::new(SecurityState::open()));
    let registry = Arc::clone(state.runner.registry());
    let app = create_router(state, &[]);

    let (_, body) = send(&app, "GET", "/api/v1/tasks/queue", None).await;
    assert!(body["data"]["next_task_id"].is_null());

    let running = registry.create(TaskType::TestCaseDesign, 1).unwrap();
    assert!(registry.start(&running));
    let waiting = registry.create(TaskType::TestCaseDesign, 1).unwrap();
    assert!(!registry.start(&waiting));

    let (status, body) = send(&app, "GET", "/api/v1/tasks/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["running"], 1);
    assert_eq!(body["data"]["queued"], 1);
    assert_eq!(body["data"]["next_task_id"], waiting.as_str());
}

#[tokio::test]
async fn blank_requirement_is_rejected() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/agents/requirement-analysis/async",
        Some(json!({"requirement_content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn concurrency_settings_round_trip() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/api/v1/settings/concurrency", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["max_concurrent_tasks"], 3);

    let update = json!({
        "max_concurrent_tasks": 5,
        "task_timeout": 120,
        "retry_count": 1,
        "queue_size": 50
    });
    let (status, _) = send(&app, "PUT", "/api/v1/settings/concurrency", Some(update)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/api/v1/tasks/queue", None).await;
    assert_eq!(body["data"]["max_concurrent"], 5);
    assert_eq!(body["data"]["queue_capacity"], 50);

    let invalid = json!({
        "max_concurrent_tasks": 50,
        "task_timeout": 120,
        "retry_count": 1,
        "queue_size": 50
    });
    let (status, _) = send(&app, "PUT", "/api/v1/settings/concurrency", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn seeded_taxonomy_is_listed() {
    let app = app().await;
    let (_, all) = send(&app, "GET", "/api/v1/settings/test-categories", None).await;
    let uri = "/api/v1/settings/test-categories?active_only=true";
    let (_, active) = send(&app, "GET", uri, None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 15);
    assert_eq!(active["data"].as_array().unwrap().len(), 6);

    let (_, methods) = send(&app, "GET", "/api/v1/settings/design-methods", None).await;
    assert_eq!(methods["data"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn requirement_files_and_one_click() {
    let app = app().await;
    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/requirements/files",
        Some(json!({"filename": "checkout.md", "module_id": 3, "extracted_content": "Login"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let file_id = created["data"]["id"].as_i64().unwrap();

    let uri = format!("/api/v1/requirements/files/{}", file_id);
    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, launched) = send(
        &app,
        "POST",
        &format!("/api/v1/requirements/files/{}/generate", file_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(launched["task_id"].is_string());

    let uri = "/api/v1/requirements/files/9999/generate";
    let (status, _) = send(&app, "POST", uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agents_and_models_are_listed() {
    let app = app().await;
    let (_, types) = send(&app, "GET", "/api/v1/agents/types", None).await;
    assert_eq!(types["data"].as_array().unwrap().len(), 4);

    let (_, agents) = send(&app, "GET", "/api/v1/agents?type=test_case_designer", None).await;
    assert_eq!(agents["data"].as_array().unwrap().len(), 1);

    let (_, models) = send(&app, "GET", "/api/v1/ai-models", None).await;
    assert!(models["data"][0].get("api_key").is_none());

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/ai-models",
        Some(json!({"name": "dup", "model_id": "gpt-test"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/v1/agents/task-logs?limit=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn secret_key_mode_guards_the_api() {
    let (app, _db) = app_with(SecurityState::new(SecurityConfig {
        mode: SecurityMode::SecretKey,
        secret_key: Some("s3cret".into()),
    }))
    .await;

    let (status, body) = send(&app, "GET", "/api/v1/tasks/queue", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "authentication_error");

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/v1/tasks/queue")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
