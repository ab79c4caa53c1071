//! Bodies of the asynchronous launch endpoints

use crate::api::error::{ApiError, ApiResult};
use crate::api::middleware::validation::validate_not_empty;
use crate::pipeline::model::{RequirementPointInput, TestCaseContent, TestPointInput};
use crate::pipeline::StageAgentIds;
use crate::tasks::{Submission, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct RequirementAnalysisRequest {
    pub requirement_content: String,
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
}

impl RequirementAnalysisRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.image_paths.is_empty() {
            validate_not_empty(&self.requirement_content, "requirement_content")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestPointGenerationRequest {
    pub requirement_points: Vec<RequirementPointInput>,
    pub agent_id: Option<i64>,
    /// When set, generated points are stored under this module
    pub module_id: Option<i64>,
}

impl TestPointGenerationRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.requirement_points.iter().all(|rp| rp.content.trim().is_empty()) {
            return Err(ApiError::ValidationError("requirement_points cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseDesignRequest {
    pub test_points: Vec<TestPointInput>,
    pub module_id: Option<i64>,
    pub agent_id: Option<i64>,
}

impl TestCaseDesignRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.test_points.is_empty() {
            return Err(ApiError::ValidationError("test_points cannot be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestCaseOptimizationRequest {
    pub test_cases: Vec<TestCaseContent>,
    pub agent_id: Option<i64>,
    #[serde(default)]
    pub auto_save: bool,
}

impl TestCaseOptimizationRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.test_cases.is_empty() {
            return Err(ApiError::ValidationError("test_cases cannot be empty".into()));
        }
        Ok(())
    }
}

/// Body of one-click generation; everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OneClickBody {
    #[serde(default)]
    pub agent_ids: StageAgentIds,
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
}

/// Answer to every launch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub queue_position: Option<usize>,
    pub message: String,
}

impl From<Submission> for LaunchResponse {
    fn from(submission: Submission) -> Self {
        let message = match submission.queue_position {
            Some(position) => format!("Task queued at position {}", position),
            None => "Task started".to_string(),
        };
        Self {
            task_id: submission.task_id,
            status: submission.status,
            queue_position: submission.queue_position,
            message,
        }
    }
}
