//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use llm::{ChatClient, ChatRequest, Role};
use std::sync::Arc;
use std::time::Duration;
use testflow::db::models::{AiModel, NewAgent, NewAiModel};
use testflow::db::repositories::{AgentRepository, AiModelRepository};
use testflow::db::{seed_defaults, DatabaseConnection};
use testflow::pipeline::{
    AgentDirectory, AgentKind, AgentOrchestrator, ClientFactory, PipelineError, PipelineSettings,
};
use testflow::services::GenerationService;
use testflow::tasks::{AdmissionGate, ConcurrencyConfig, TaskRegistry, TaskRunner, TaskStatus};

pub type Reply = dyn Fn(AgentKind, &str) -> llm::Result<String> + Send + Sync;

/// Answers by stage; the stage is read back from the agent's system prompt.
pub struct ScriptedClient {
    reply: Arc<Reply>,
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> llm::Result<String> {
        let text = |role: Role| {
            request
                .messages
                .iter()
                .find(|m| m.role == role)
                .map(|m| m.content.text())
                .unwrap_or_default()
        };
        let system = text(Role::System);
        let kind = AgentKind::all()
            .into_iter()
            .find(|kind| system == kind.as_str())
            .unwrap_or(AgentKind::RequirementSplitter);
        (self.reply)(kind, &text(Role::User))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub struct ScriptedFactory {
    pub reply: Arc<Reply>,
}

impl ClientFactory for ScriptedFactory {
    fn build(&self, _model: &AiModel) -> Result<Arc<dyn ChatClient>, PipelineError> {
        Ok(Arc::new(ScriptedClient {
            reply: Arc::clone(&self.reply),
        }))
    }
}

pub async fn database() -> DatabaseConnection {
    let db = DatabaseConnection::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();
    seed_defaults(db.pool()).await.unwrap();
    db
}

/// One active agent per stage, each prompted with its own type name.
pub async fn seed_agents(db: &DatabaseConnection) {
    let model = AiModelRepository::create(
        db.pool(),
        &NewAiModel {
            name: "test model".into(),
            provider: "openai".into(),
            model_id: "gpt-test".into(),
            api_key: Some("sk-test".into()),
            base_url: None,
            max_tokens: 2048,
            temperature: 0.3,
            is_active: true,
        },
    )
    .await
    .unwrap();

    for kind in AgentKind::all() {
        AgentRepository::create(
            db.pool(),
            &NewAgent {
                name: kind.label().to_string(),
                agent_type: kind,
                ai_model_id: Some(model.id),
                system_prompt: Some(kind.as_str().to_string()),
                temperature: 0.3,
                max_tokens: 2048,
                is_active: true,
            },
        )
        .await
        .unwrap();
    }
}

pub fn service(
    db: &DatabaseConnection,
    config: ConcurrencyConfig,
    reply: Arc<Reply>,
) -> GenerationService {
    let gate = AdmissionGate::new(config);
    let registry = Arc::new(TaskRegistry::new(gate.clone()));
    let runner = Arc::new(TaskRunner::new(registry));
    let settings = PipelineSettings {
        retry_base_delay_ms: 1,
        failed_response_dir: tempfile::tempdir().unwrap().keep(),
        ..Default::default()
    };
    let orchestrator = AgentOrchestrator::new(gate, settings);
    let directory = AgentDirectory::new(db.clone(), Arc::new(ScriptedFactory { reply }));
    GenerationService::new(db.clone(), runner, orchestrator, directory)
}

pub async fn wait_terminal(runner: &TaskRunner, task_id: &str) -> TaskStatus {
    for _ in 0..500 {
        if let Some(status) = runner.registry().status_of(task_id) {
            if status.is_terminal() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not finish", task_id);
}
