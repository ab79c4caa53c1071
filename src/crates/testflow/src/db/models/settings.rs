//! System settings rows

use serde::Serialize;
use sqlx::FromRow;

/// A JSON-valued setting keyed by `config_key`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SystemConfig {
    pub id: i64,
    pub config_key: String,
    /// JSON text
    pub config_value: String,
    pub description: Option<String>,
    pub updated_at: String,
}

/// Test category (test type) offered to the generators.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestCategory {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
}

/// Test design technique offered to the generators.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestDesignMethod {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
}
