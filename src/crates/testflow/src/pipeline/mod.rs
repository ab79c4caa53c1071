//! Four-stage test generation pipeline
//!
//! Requirement analysis, test point generation, test case design and test
//! case optimization, each run by a configured agent through the batch
//! executor.

pub mod agents;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;

pub use agents::{
    AgentDirectory, AgentHandle, AgentKind, ClientFactory, OpenAiClientFactory, StageAgentIds,
    StageAgents,
};
pub use orchestrator::{AgentOrchestrator, DbCaseSink, OneClickRequest, TestCaseSink};
pub use prompts::PromptCatalog;

use crate::db::DatabaseError;
use crate::executor::ExecutorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("{0} produced no results")]
    EmptyStage(String),

    #[error("{stage} failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl PipelineError {
    pub fn stage_failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Batch sizes and call behaviour of the stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_test_point_batch_size")]
    pub test_point_batch_size: usize,

    #[serde(default = "default_case_batch_size")]
    pub test_case_batch_size: usize,

    #[serde(default = "default_case_batch_size")]
    pub optimization_batch_size: usize,

    /// Backoff base in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_failed_response_dir")]
    pub failed_response_dir: PathBuf,

    /// Whole-task deadline; unset means none
    #[serde(default)]
    pub job_deadline_secs: Option<u64>,
}

fn default_test_point_batch_size() -> usize {
    1
}

fn default_case_batch_size() -> usize {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_failed_response_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            test_point_batch_size: default_test_point_batch_size(),
            test_case_batch_size: default_case_batch_size(),
            optimization_batch_size: default_case_batch_size(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            failed_response_dir: default_failed_response_dir(),
            job_deadline_secs: None,
        }
    }
}
