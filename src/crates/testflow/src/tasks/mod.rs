//! In-memory task tracking
//!
//! The registry owns every generation task from creation to its terminal
//! state. The admission gate decides how many may run at once, and the runner
//! spawns the job futures the registry admits.

pub mod gate;
pub mod progress;
pub mod registry;
pub mod result;
pub mod runner;

pub use gate::{AdmissionGate, ConcurrencyConfig};
pub use progress::TaskProgress;
pub use registry::{QueueInfo, TaskRecord, TaskRegistry, TaskSnapshot};
pub use result::TaskResult;
pub use runner::{Submission, TaskRunner};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the registry and the runner.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} already finished with status {status}")]
    AlreadyFinished { task_id: String, status: TaskStatus },
}

/// Kind of generation job a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RequirementAnalysis,
    TestPointGeneration,
    TestCaseDesign,
    TestCaseOptimization,
    OneClickGeneration,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RequirementAnalysis => "requirement_analysis",
            TaskType::TestPointGeneration => "test_point_generation",
            TaskType::TestCaseDesign => "test_case_design",
            TaskType::TestCaseOptimization => "test_case_optimization",
            TaskType::OneClickGeneration => "one_click_generation",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a running slot
    Pending,
    /// Admitted and executing
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Exceeded the whole-job deadline
    Timeout,
}

impl TaskStatus {
    /// Terminal states accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled | TaskStatus::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
