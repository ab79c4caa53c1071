//! Progress reporting handle passed into running jobs

use super::registry::TaskRegistry;
use crate::executor::ProgressSpan;
use std::sync::Arc;

/// Writes progress for one task into its registry.
///
/// A detached handle reports nowhere, which lets stages run outside a task.
#[derive(Clone)]
pub struct TaskProgress {
    target: Option<(Arc<TaskRegistry>, String)>,
}

impl TaskProgress {
    pub fn new(registry: Arc<TaskRegistry>, task_id: impl Into<String>) -> Self {
        Self {
            target: Some((registry, task_id.into())),
        }
    }

    pub fn detached() -> Self {
        Self { target: None }
    }

    pub fn task_id(&self) -> Option<&str> {
        self.target.as_ref().map(|(_, id)| id.as_str())
    }

    /// Raise progress to `percent` with a status message.
    pub fn set(&self, percent: u8, message: impl Into<String>) {
        if let Some((registry, task_id)) = &self.target {
            registry.update_progress(task_id, percent as i32, Some(message.into()));
        }
    }

    /// Report `completed` of `total` batches inside `span`.
    pub fn batches(
        &self,
        span: ProgressSpan,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        if let Some((registry, task_id)) = &self.target {
            registry.set_batches(task_id, total, completed);
            let percent = span.at(completed, total) as i32;
            registry.update_progress(task_id, percent, Some(message.into()));
        }
    }

    /// True once the task reached a terminal state, e.g. after a cancel.
    pub fn is_finished(&self) -> bool {
        match &self.target {
            Some((registry, task_id)) => registry.is_terminal(task_id),
            None => false,
        }
    }
}
