//! Requirement documents and the points split out of them

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A requirement document whose text was already extracted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequirementFile {
    pub id: i64,
    pub filename: String,
    pub module_id: Option<i64>,
    pub extracted_content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequirementFile {
    pub filename: String,
    pub module_id: Option<i64>,
    pub extracted_content: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequirementPoint {
    pub id: i64,
    pub requirement_file_id: Option<i64>,
    pub module_id: Option<i64>,
    pub content: String,
    pub module_name: Option<String>,
    pub priority: String,
    /// `ai_generated` or `manual`
    pub source: String,
    pub order_index: i64,
    pub created_at: String,
}
