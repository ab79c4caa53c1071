//! Stage agents and the clients that back them

use super::PipelineError;
use crate::db::models::{Agent, AiModel};
use crate::db::repositories::{AgentRepository, AiModelRepository};
use crate::db::DatabaseConnection;
use llm::{ChatClient, ChatMessage, ChatRequest, ImageUrl, OpenAiClient, RemoteLlmConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The pipeline stage an agent serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    RequirementSplitter,
    TestPointGenerator,
    TestCaseDesigner,
    TestCaseOptimizer,
}

impl AgentKind {
    pub fn all() -> [AgentKind; 4] {
        [
            AgentKind::RequirementSplitter,
            AgentKind::TestPointGenerator,
            AgentKind::TestCaseDesigner,
            AgentKind::TestCaseOptimizer,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::RequirementSplitter => "requirement_splitter",
            AgentKind::TestPointGenerator => "test_point_generator",
            AgentKind::TestCaseDesigner => "test_case_designer",
            AgentKind::TestCaseOptimizer => "test_case_optimizer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::RequirementSplitter => "Requirement splitter",
            AgentKind::TestPointGenerator => "Test point generator",
            AgentKind::TestCaseDesigner => "Test case designer",
            AgentKind::TestCaseOptimizer => "Test case optimizer",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved agent: its persona plus a ready client for its model.
#[derive(Clone)]
pub struct AgentHandle {
    pub agent_id: Option<i64>,
    pub name: String,
    pub client: Arc<dyn ChatClient>,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("agent_id", &self.agent_id)
            .field("name", &self.name)
            .field("model", &self.client.model())
            .finish()
    }
}

impl AgentHandle {
    /// Build the system + user request for one call.
    pub fn request(&self, user_prompt: impl Into<String>, images: &[ImageUrl]) -> ChatRequest {
        let user = if images.is_empty() {
            ChatMessage::user(user_prompt)
        } else {
            ChatMessage::user_with_images(user_prompt, images.to_vec())
        };

        ChatRequest::new(vec![ChatMessage::system(self.system_prompt.clone()), user])
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

/// Builds a chat client for a stored model endpoint.
pub trait ClientFactory: Send + Sync {
    fn build(&self, model: &AiModel) -> Result<Arc<dyn ChatClient>, PipelineError>;
}

/// Streaming OpenAI-compatible clients.
#[derive(Debug, Clone)]
pub struct OpenAiClientFactory {
    timeout: Duration,
}

impl OpenAiClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for OpenAiClientFactory {
    fn build(&self, model: &AiModel) -> Result<Arc<dyn ChatClient>, PipelineError> {
        let api_key = model.api_key.clone().unwrap_or_default();
        let base_url = model
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let config = RemoteLlmConfig::new(api_key, base_url, model.model_id.clone())
            .with_timeout(self.timeout);
        let client = OpenAiClient::new(config)
            .map_err(|e| PipelineError::AgentUnavailable(format!("model {}: {}", model.name, e)))?;
        Ok(Arc::new(client))
    }
}

/// Looks up agents and their models and turns them into [`AgentHandle`]s.
#[derive(Clone)]
pub struct AgentDirectory {
    db: DatabaseConnection,
    factory: Arc<dyn ClientFactory>,
}

impl AgentDirectory {
    pub fn new(db: DatabaseConnection, factory: Arc<dyn ClientFactory>) -> Self {
        Self { db, factory }
    }

    /// Use `explicit_id` if given, otherwise the first active agent of `kind`.
    pub async fn resolve(
        &self,
        kind: AgentKind,
        explicit_id: Option<i64>,
    ) -> Result<AgentHandle, PipelineError> {
        let pool = self.db.pool();
        let agent = match explicit_id {
            Some(id) => AgentRepository::get(pool, id).await?.ok_or_else(|| {
                PipelineError::AgentUnavailable(format!("agent {} does not exist", id))
            })?,
            None => AgentRepository::first_active(pool, kind).await?.ok_or_else(|| {
                PipelineError::AgentUnavailable(format!("no active {} agent configured", kind))
            })?,
        };

        if agent.agent_type != kind.as_str() {
            warn!(
                agent_id = agent.id,
                expected = %kind,
                actual = %agent.agent_type,
                "Agent type differs from stage"
            );
        }

        let model = self.model_for(&agent).await?;
        let client = self.factory.build(&model)?;
        debug!(agent_id = agent.id, model = %model.model_id, stage = %kind, "Agent resolved");

        Ok(AgentHandle {
            agent_id: Some(agent.id),
            name: agent.name.clone(),
            client,
            system_prompt: agent.system_prompt.clone().unwrap_or_default(),
            temperature: agent.temperature as f32,
            max_tokens: agent.max_tokens.clamp(1, u32::MAX as i64) as u32,
        })
    }

    /// Resolve all four stages, stopping at the first unusable one.
    pub async fn resolve_all(&self, ids: &StageAgentIds) -> Result<StageAgents, PipelineError> {
        let splitter = self
            .resolve(AgentKind::RequirementSplitter, ids.requirement_splitter)
            .await?;
        let point_generator = self
            .resolve(AgentKind::TestPointGenerator, ids.test_point_generator)
            .await?;
        let case_designer = self
            .resolve(AgentKind::TestCaseDesigner, ids.test_case_designer)
            .await?;
        let optimizer = self
            .resolve(AgentKind::TestCaseOptimizer, ids.test_case_optimizer)
            .await?;
        Ok(StageAgents {
            splitter,
            point_generator,
            case_designer,
            optimizer,
        })
    }

    async fn model_for(&self, agent: &Agent) -> Result<AiModel, PipelineError> {
        if !agent.is_active {
            return Err(PipelineError::AgentUnavailable(format!(
                "agent {} is inactive",
                agent.name
            )));
        }
        if agent.system_prompt.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(PipelineError::AgentUnavailable(format!(
                "agent {} has no system prompt",
                agent.name
            )));
        }

        let model_id = agent.ai_model_id.ok_or_else(|| {
            PipelineError::AgentUnavailable(format!("agent {} has no AI model", agent.name))
        })?;
        let model = AiModelRepository::get(self.db.pool(), model_id)
            .await?
            .ok_or_else(|| {
                PipelineError::AgentUnavailable(format!("AI model {} does not exist", model_id))
            })?;

        if !model.has_api_key() {
            return Err(PipelineError::AgentUnavailable(format!(
                "AI model {} has no API key",
                model.name
            )));
        }
        Ok(model)
    }
}

/// Optional explicit agent per stage; missing entries use the first active agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageAgentIds {
    pub requirement_splitter: Option<i64>,
    pub test_point_generator: Option<i64>,
    pub test_case_designer: Option<i64>,
    pub test_case_optimizer: Option<i64>,
}

/// One agent per stage, for one-click generation.
#[derive(Debug, Clone)]
pub struct StageAgents {
    pub splitter: AgentHandle,
    pub point_generator: AgentHandle,
    pub case_designer: AgentHandle,
    pub optimizer: AgentHandle,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{NewAgent, NewAiModel};
    use crate::db::test_support::migrated;
    use async_trait::async_trait;
    use llm::Role;

    struct EchoClient;

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn chat(&self, _request: ChatRequest) -> llm::Result<String> {
            Ok("{}".to_string())
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    struct EchoFactory;

    impl ClientFactory for EchoFactory {
        fn build(&self, _model: &AiModel) -> Result<Arc<dyn ChatClient>, PipelineError> {
            Ok(Arc::new(EchoClient))
        }
    }

    fn new_model(api_key: Option<&str>) -> NewAiModel {
        NewAiModel {
            name: "gpt".into(),
            provider: "openai".into(),
            model_id: format!("gpt-{}", api_key.unwrap_or("none")),
            api_key: api_key.map(String::from),
            base_url: None,
            max_tokens: 2048,
            temperature: 0.5,
            is_active: true,
        }
    }

    fn new_agent(
        kind: AgentKind,
        model: Option<i64>,
        prompt: Option<&str>,
        active: bool,
    ) -> NewAgent {
        NewAgent {
            name: format!("{} agent", kind),
            agent_type: kind,
            ai_model_id: model,
            system_prompt: prompt.map(String::from),
            temperature: 0.3,
            max_tokens: 1024,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_resolve_first_active() {
        let db = migrated().await;
        let model = AiModelRepository::create(db.pool(), &new_model(Some("sk-1"))).await.unwrap();
        AgentRepository::create(
            db.pool(),
            &new_agent(AgentKind::TestCaseDesigner, Some(model.id), Some("You design."), false),
        )
        .await
        .unwrap();
        let active = AgentRepository::create(
            db.pool(),
            &new_agent(AgentKind::TestCaseDesigner, Some(model.id), Some("You design."), true),
        )
        .await
        .unwrap();

        let directory = AgentDirectory::new(db.clone(), Arc::new(EchoFactory));
        let handle = directory.resolve(AgentKind::TestCaseDesigner, None).await.unwrap();
        assert_eq!(handle.agent_id, Some(active.id));
        assert_eq!(handle.max_tokens, 1024);
        assert!((handle.temperature - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_resolve_rejections() {
        let db = migrated().await;
        let keyless = AiModelRepository::create(db.pool(), &new_model(None)).await.unwrap();
        let keyed = AiModelRepository::create(db.pool(), &new_model(Some("sk-2"))).await.unwrap();
        let directory = AgentDirectory::new(db.clone(), Arc::new(EchoFactory));

        let err = directory.resolve(AgentKind::RequirementSplitter, None).await.unwrap_err();
        assert!(err.to_string().contains("no active requirement_splitter agent"));

        let no_prompt = AgentRepository::create(
            db.pool(),
            &new_agent(AgentKind::RequirementSplitter, Some(keyed.id), None, true),
        )
        .await
        .unwrap();
        let err = directory
            .resolve(AgentKind::RequirementSplitter, Some(no_prompt.id))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no system prompt"));

        let no_key = AgentRepository::create(
            db.pool(),
            &new_agent(AgentKind::RequirementSplitter, Some(keyless.id), Some("Split."), true),
        )
        .await
        .unwrap();
        let err = directory
            .resolve(AgentKind::RequirementSplitter, Some(no_key.id))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no API key"));

        let inactive = AgentRepository::create(
            db.pool(),
            &new_agent(AgentKind::RequirementSplitter, Some(keyed.id), Some("Split."), false),
        )
        .await
        .unwrap();
        let err = directory
            .resolve(AgentKind::RequirementSplitter, Some(inactive.id))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AgentUnavailable(_)));

        let err = directory.resolve(AgentKind::RequirementSplitter, Some(4242)).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_request_shape() {
        let handle = AgentHandle {
            agent_id: None,
            name: "splitter".into(),
            client: Arc::new(EchoClient),
            system_prompt: "You split requirements.".into(),
            temperature: 0.2,
            max_tokens: 512,
        };

        let request = handle.request("doc", &[]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.max_tokens, Some(512));
        assert!(!request.has_images());

        let image = ImageUrl {
            url: "data:image/png;base64,AAAA".into(),
            detail: Some("high".into()),
        };
        assert!(handle.request("doc", &[image]).has_images());
    }

    #[test]
    fn test_kind_serde() {
        let kind: AgentKind = serde_json::from_str("\"test_case_optimizer\"").unwrap();
        assert_eq!(kind, AgentKind::TestCaseOptimizer);
        assert_eq!(AgentKind::all().len(), 4);
    }
}
