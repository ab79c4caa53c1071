//! Model and agent repositories

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{Agent, AiModel, NewAgent, NewAiModel};
use crate::pipeline::agents::AgentKind;
use chrono::Utc;

const AI_MODEL_COLUMNS: &str = "id, name, provider, model_id, api_key, base_url, max_tokens, \
                                temperature, is_active, created_at, updated_at";

const AGENT_COLUMNS: &str = "id, name, agent_type, ai_model_id, system_prompt, temperature, \
                             max_tokens, is_active, created_at, updated_at";

pub struct AiModelRepository;

impl AiModelRepository {
    /// Insert a model. A duplicate `model_id` is a constraint violation.
    pub async fn create(pool: &DatabasePool, model: &NewAiModel) -> DbResult<AiModel> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query_as::<_, AiModel>(&format!(
            "INSERT INTO ai_models (name, provider, model_id, api_key, base_url, max_tokens, \
             temperature, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            AI_MODEL_COLUMNS
        ))
        .bind(&model.name)
        .bind(&model.provider)
        .bind(&model.model_id)
        .bind(&model.api_key)
        .bind(&model.base_url)
        .bind(model.max_tokens)
        .bind(model.temperature)
        .bind(model.is_active)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn get(pool: &DatabasePool, id: i64) -> DbResult<Option<AiModel>> {
        let row = sqlx::query_as::<_, AiModel>(&format!(
            "SELECT {} FROM ai_models WHERE id = ?",
            AI_MODEL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn list(pool: &DatabasePool) -> DbResult<Vec<AiModel>> {
        let rows = sqlx::query_as::<_, AiModel>(&format!(
            "SELECT {} FROM ai_models ORDER BY id ASC",
            AI_MODEL_COLUMNS
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

pub struct AgentRepository;

impl AgentRepository {
    pub async fn create(pool: &DatabasePool, agent: &NewAgent) -> DbResult<Agent> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query_as::<_, Agent>(&format!(
            "INSERT INTO agents (name, agent_type, ai_model_id, system_prompt, temperature, \
             max_tokens, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            AGENT_COLUMNS
        ))
        .bind(&agent.name)
        .bind(agent.agent_type.as_str())
        .bind(agent.ai_model_id)
        .bind(&agent.system_prompt)
        .bind(agent.temperature)
        .bind(agent.max_tokens)
        .bind(agent.is_active)
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn get(pool: &DatabasePool, id: i64) -> DbResult<Option<Agent>> {
        let row = sqlx::query_as::<_, Agent>(&format!(
            "SELECT {} FROM agents WHERE id = ?",
            AGENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn list(pool: &DatabasePool, kind: Option<AgentKind>) -> DbResult<Vec<Agent>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query_as::<_, Agent>(&format!(
                    "SELECT {} FROM agents WHERE agent_type = ? ORDER BY id ASC",
                    AGENT_COLUMNS
                ))
                .bind(kind.as_str())
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Agent>(&format!(
                    "SELECT {} FROM agents ORDER BY id ASC",
                    AGENT_COLUMNS
                ))
                .fetch_all(pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// The lowest-id active agent of `kind`.
    pub async fn first_active(pool: &DatabasePool, kind: AgentKind) -> DbResult<Option<Agent>> {
        let row = sqlx::query_as::<_, Agent>(&format!(
            "SELECT {} FROM agents WHERE agent_type = ? AND is_active = 1 ORDER BY id ASC LIMIT 1",
            AGENT_COLUMNS
        ))
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }
}
