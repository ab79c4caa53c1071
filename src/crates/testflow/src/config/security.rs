//! Bearer-key authentication middleware

use crate::config::{SecurityConfig, SecurityMode};
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Security middleware state
#[derive(Debug, Clone)]
pub struct SecurityState {
    config: Arc<SecurityConfig>,
}

impl SecurityState {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn open() -> Self {
        Self::new(SecurityConfig::default())
    }

    pub fn mode(&self) -> SecurityMode {
        self.config.mode
    }

    fn accepts(&self, request: &Request) -> bool {
        let Some(expected) = self.config.secret_key.as_deref().filter(|k| !k.is_empty()) else {
            return false;
        };
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|key| key == expected)
            .unwrap_or(false)
    }
}

/// Security middleware for Axum
pub async fn security_middleware(
    state: Arc<SecurityState>,
    request: Request,
    next: Next,
) -> Response {
    match state.mode() {
        SecurityMode::Open => next.run(request).await,
        SecurityMode::SecretKey => {
            if state.accepts(&request) {
                return next.run(request).await;
            }
            warn!(
                path = %request.uri().path(),
                "Unauthorized request - missing or invalid API key"
            );
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": {
                        "code": "UNAUTHORIZED",
                        "message": "Missing or invalid API key",
                        "type": "authentication_error"
                    }
                })),
            )
                .into_response()
        }
    }
}
