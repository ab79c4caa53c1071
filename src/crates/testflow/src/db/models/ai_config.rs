//! Model endpoints and stage agents

use crate::pipeline::agents::AgentKind;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An OpenAI-compatible model endpoint.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AiModel {
    pub id: i64,
    pub name: String,
    pub provider: String,
    /// Model name sent upstream, unique across rows
    pub model_id: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: i64,
    pub temperature: f64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl AiModel {
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAiModel {
    pub name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A configured LLM persona for one pipeline stage.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub ai_model_id: Option<i64>,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: AgentKind,
    pub ai_model_id: Option<i64>,
    pub system_prompt: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_max_tokens() -> i64 {
    4096
}

fn default_temperature() -> f64 {
    0.7
}

fn default_active() -> bool {
    true
}
