//! Task registry
//!
//! Owns every task record and the FIFO wait queue. All mutations happen under
//! one synchronous lock, so a transition is never observed half-applied.
//! Promotion of queued tasks is caller-driven; the registry never spawns work.

use super::gate::AdmissionGate;
use super::result::TaskResult;
use super::{TaskError, TaskStatus, TaskType};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress floor applied when a task starts running.
pub const START_PROGRESS: u8 = 5;

/// One generation task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    /// 0-100, never decreasing while the task is live
    pub progress: u8,
    pub total_batches: usize,
    pub completed_batches: usize,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    fn new(task_type: TaskType, total_batches: usize) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            task_type,
            status: TaskStatus::Pending,
            progress: 0,
            total_batches,
            completed_batches: 0,
            result: None,
            error: None,
            message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Status view returned to pollers.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    #[serde(flatten)]
    pub task: TaskRecord,
    /// 1-based position in the wait queue, if queued
    pub queue_position: Option<usize>,
}

/// Gate and queue occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueInfo {
    pub max_concurrent: usize,
    pub queue_capacity: usize,
    pub running: usize,
    pub queued: usize,
    pub total: usize,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, TaskRecord>,
    queue: VecDeque<String>,
    running: usize,
}

impl Inner {
    fn enqueue(&mut self, task_id: &str) {
        if !self.queue.iter().any(|id| id == task_id) {
            self.queue.push_back(task_id.to_string());
        }
    }

    fn dequeue(&mut self, task_id: &str) {
        self.queue.retain(|id| id != task_id);
    }

    /// Drop ids at the head of the queue that are no longer pending.
    fn clean_head(&mut self) {
        while let Some(head) = self.queue.front() {
            let pending = self
                .tasks
                .get(head)
                .map(|t| t.status == TaskStatus::Pending)
                .unwrap_or(false);
            if pending {
                break;
            }
            self.queue.pop_front();
        }
    }

    fn mark_running(&mut self, task_id: &str) {
        self.dequeue(task_id);
        if let Some(task) = self.tasks.get_mut(task_id) {
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            task.progress = task.progress.max(START_PROGRESS);
            self.running += 1;
        }
    }

    /// Apply a terminal transition once; later calls are rejected.
    fn finish<F>(&mut self, task_id: &str, status: TaskStatus, apply: F) -> bool
    where
        F: FnOnce(&mut TaskRecord),
    {
        let was_running = match self.tasks.get_mut(task_id) {
            Some(task) if !task.status.is_terminal() => {
                let was_running = task.status == TaskStatus::Running;
                task.status = status;
                task.completed_at = Some(Utc::now());
                apply(task);
                was_running
            }
            _ => return false,
        };

        if was_running {
            self.running = self.running.saturating_sub(1);
        }
        self.dequeue(task_id);
        true
    }
}

/// Explicit, injectable task store. Several registries may coexist.
pub struct TaskRegistry {
    gate: AdmissionGate,
    inner: Mutex<Inner>,
}

impl TaskRegistry {
    pub fn new(gate: AdmissionGate) -> Self {
        Self {
            gate,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Allocate a PENDING task, queueing it when no running slot is free.
    pub fn create(&self, task_type: TaskType, total_batches: usize) -> Result<String, TaskError> {
        let mut inner = self.inner.lock();
        inner.clean_head();

        if !self.gate.can_enqueue(inner.queue.len()) {
            let capacity = self.gate.queue_capacity();
            warn!(task_type = %task_type, capacity = capacity, "Task queue is full");
            return Err(TaskError::QueueFull { capacity });
        }

        let task = TaskRecord::new(task_type, total_batches);
        let task_id = task.task_id.clone();
        inner.tasks.insert(task_id.clone(), task);

        if !self.gate.can_start(inner.running) {
            inner.enqueue(&task_id);
            info!(
                task_id = %task_id,
                task_type = %task_type,
                queued = inner.queue.len(),
                "Task created and queued"
            );
        } else {
            info!(task_id = %task_id, task_type = %task_type, "Task created");
        }

        Ok(task_id)
    }

    /// Try PENDING -> RUNNING.
    ///
    /// Returns false when the task is unknown or not pending. When the gate is
    /// saturated, or earlier tasks are still waiting, the task is queued and
    /// false is returned.
    pub fn start(&self, task_id: &str) -> bool {
        let mut inner = self.inner.lock();

        match inner.tasks.get(task_id) {
            Some(task) if task.status == TaskStatus::Pending => {}
            Some(task) => {
                debug!(task_id = %task_id, status = %task.status, "Start ignored");
                return false;
            }
            None => return false,
        }

        if !self.gate.can_start(inner.running) {
            inner.enqueue(task_id);
            debug!(task_id = %task_id, running = inner.running, "Gate saturated, task queued");
            return false;
        }

        inner.clean_head();
        if let Some(head) = inner.queue.front() {
            if head != task_id {
                inner.enqueue(task_id);
                debug!(task_id = %task_id, "Earlier tasks waiting, task queued");
                return false;
            }
        }

        inner.mark_running(task_id);
        info!(task_id = %task_id, running = inner.running, "Task started");
        true
    }

    /// Pop the head of the wait queue and start it, if a slot is free.
    pub fn start_next(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.clean_head();

        if !self.gate.can_start(inner.running) {
            return None;
        }

        let task_id = inner.queue.pop_front()?;
        inner.mark_running(&task_id);
        info!(task_id = %task_id, running = inner.running, "Queued task promoted");
        Some(task_id)
    }

    /// Head of the wait queue, skipping ids that are no longer pending.
    pub fn next_pending(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        inner.clean_head();
        inner.queue.front().cloned()
    }

    /// Raise progress to `percent` (clamped to 0-100). Never lowers it.
    pub fn update_progress(&self, task_id: &str, percent: i32, message: Option<String>) -> bool {
        let mut inner = self.inner.lock();
        let Some(task) = inner.tasks.get_mut(task_id) else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }

        let clamped = percent.clamp(0, 100) as u8;
        task.progress = task.progress.max(clamped);
        if message.is_some() {
            task.message = message;
        }
        true
    }

    /// Record batch counters without touching progress.
    pub fn set_batches(&self, task_id: &str, total: usize, completed: usize) -> bool {
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(task_id) {
            Some(task) if !task.status.is_terminal() => {
                task.total_batches = total;
                task.completed_batches = completed.min(total);
                true
            }
            _ => false,
        }
    }

    pub fn complete(&self, task_id: &str, result: TaskResult) -> bool {
        let done = self.inner.lock().finish(task_id, TaskStatus::Completed, |task| {
            task.progress = 100;
            task.result = Some(result);
            task.message = Some("Task completed".to_string());
        });
        if done {
            info!(task_id = %task_id, "Task completed");
        }
        done
    }

    pub fn fail(&self, task_id: &str, error: impl Into<String>) -> bool {
        let error = error.into();
        let done = self.inner.lock().finish(task_id, TaskStatus::Failed, |task| {
            task.message = Some(format!("Task failed: {}", error));
            task.error = Some(error);
        });
        if done {
            warn!(task_id = %task_id, "Task failed");
        }
        done
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        let done = self.inner.lock().finish(task_id, TaskStatus::Cancelled, |task| {
            task.message = Some("Task cancelled".to_string());
        });
        if done {
            info!(task_id = %task_id, "Task cancelled");
        }
        done
    }

    pub fn timeout(&self, task_id: &str) -> bool {
        let done = self.inner.lock().finish(task_id, TaskStatus::Timeout, |task| {
            task.error = Some("Task exceeded its deadline".to_string());
            task.message = Some("Task timed out".to_string());
        });
        if done {
            warn!(task_id = %task_id, "Task timed out");
        }
        done
    }

    pub fn get_status(&self, task_id: &str) -> Option<TaskSnapshot> {
        let inner = self.inner.lock();
        let task = inner.tasks.get(task_id)?.clone();
        let queue_position = if task.status == TaskStatus::Pending {
            inner
                .queue
                .iter()
                .filter(|id| {
                    inner
                        .tasks
                        .get(id.as_str())
                        .map(|t| t.status == TaskStatus::Pending)
                        .unwrap_or(false)
                })
                .position(|id| id == task_id)
                .map(|p| p + 1)
        } else {
            None
        };
        Some(TaskSnapshot {
            task,
            queue_position,
        })
    }

    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.inner.lock().tasks.get(task_id).map(|t| t.status)
    }

    pub fn is_terminal(&self, task_id: &str) -> bool {
        self.status_of(task_id)
            .map(|s| s.is_terminal())
            .unwrap_or(true)
    }

    /// Drop terminal tasks that finished more than `max_age` ago.
    pub fn prune_finished(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut inner = self.inner.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|_, task| {
            !(task.status.is_terminal() && task.completed_at.map(|at| at < cutoff).unwrap_or(false))
        });
        let pruned = before - inner.tasks.len();
        if pruned > 0 {
            info!(pruned = pruned, "Pruned finished tasks");
        }
        pruned
    }

    pub fn running_count(&self) -> usize {
        self.inner.lock().running
    }

    pub fn queue_info(&self) -> QueueInfo {
        let mut inner = self.inner.lock();
        inner.clean_head();
        QueueInfo {
            max_concurrent: self.gate.max_concurrent(),
            queue_capacity: self.gate.queue_capacity(),
            running: inner.running,
            queued: inner.queue.len(),
            total: inner.tasks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::ConcurrencyConfig;

    fn registry(max_concurrent: usize, queue_size: usize) -> TaskRegistry {
        TaskRegistry::new(AdmissionGate::new(ConcurrencyConfig {
            max_concurrent_tasks: max_concurrent,
            queue_size,
            ..Default::default()
        }))
    }

    fn done() -> TaskResult {
        TaskResult::Generation(Default::default())
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let reg = registry(3, 100);
        assert!(reg.get_status("missing").is_none());
        assert!(!reg.start("missing"));
        assert!(!reg.update_progress("missing", 50, None));
        assert!(!reg.complete("missing", done()));
        assert!(!reg.fail("missing", "x"));
        assert!(!reg.cancel("missing"));
        assert!(!reg.timeout("missing"));
    }

    #[test]
    fn test_start_sets_floor() {
        let reg = registry(3, 100);
        let id = reg.create(TaskType::TestCaseDesign, 4).unwrap();
        let snap = reg.get_status(&id).unwrap();
        assert_eq!(snap.task.status, TaskStatus::Pending);
        assert_eq!(snap.task.total_batches, 4);

        assert!(reg.start(&id));
        let snap = reg.get_status(&id).unwrap();
        assert_eq!(snap.task.status, TaskStatus::Running);
        assert_eq!(snap.task.progress, START_PROGRESS);
        assert!(snap.task.started_at.is_some());
        assert!(!reg.start(&id));
    }

    #[test]
    fn test_progress_is_clamped_and_monotonic() {
        let reg = registry(3, 100);
        let id = reg.create(TaskType::TestPointGeneration, 1).unwrap();
        reg.start(&id);

        reg.update_progress(&id, 250, Some("way over".into()));
        assert_eq!(reg.get_status(&id).unwrap().task.progress, 100);

        let id = reg.create(TaskType::TestPointGeneration, 1).unwrap();
        reg.start(&id);
        reg.update_progress(&id, 40, None);
        reg.update_progress(&id, -10, None);
        reg.update_progress(&id, 20, None);
        assert_eq!(reg.get_status(&id).unwrap().task.progress, 40);
    }

    #[test]
    fn test_terminality_is_final() {
        let reg = registry(3, 100);
        let id = reg.create(TaskType::RequirementAnalysis, 1).unwrap();
        reg.start(&id);
        reg.update_progress(&id, 30, None);
        assert!(reg.fail(&id, "boom"));

        assert!(!reg.complete(&id, done()));
        assert!(!reg.cancel(&id));
        assert!(!reg.timeout(&id));
        assert!(!reg.update_progress(&id, 90, None));
        assert!(!reg.set_batches(&id, 1, 1));

        let snap = reg.get_status(&id).unwrap();
        assert_eq!(snap.task.status, TaskStatus::Failed);
        assert_eq!(snap.task.progress, 30);
        assert_eq!(snap.task.error.as_deref(), Some("boom"));
        assert!(snap.task.completed_at.is_some());
        assert_eq!(reg.running_count(), 0);
    }

    #[test]
    fn test_running_never_exceeds_limit() {
        let reg = registry(2, 100);
        let ids: Vec<String> = (0..5)
            .map(|_| reg.create(TaskType::TestCaseDesign, 1).unwrap())
            .collect();
        let started = ids.iter().filter(|id| reg.start(id)).count();
        assert_eq!(started, 2);
        assert_eq!(reg.running_count(), 2);

        let info = reg.queue_info();
        assert_eq!(info.running, 2);
        assert_eq!(info.queued, 3);
        assert_eq!(info.total, 5);
    }

    #[test]
    fn test_fifo_promotion() {
        let reg = registry(1, 100);
        let first = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        assert!(reg.start(&first));

        let second = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        let third = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        assert_eq!(reg.get_status(&second).unwrap().queue_position, Some(1));
        assert_eq!(reg.get_status(&third).unwrap().queue_position, Some(2));

        // a slot frees, but the third task may not jump the queue
        reg.complete(&first, done());
        assert!(!reg.start(&third));
        assert_eq!(reg.next_pending(), Some(second.clone()));
        assert_eq!(reg.start_next(), Some(second.clone()));
        assert_eq!(reg.get_status(&third).unwrap().queue_position, Some(1));
        assert_eq!(reg.start_next(), None);
    }

    #[test]
    fn test_queue_full() {
        let reg = registry(1, 10);
        let first = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        assert!(reg.start(&first));
        for _ in 0..10 {
            reg.create(TaskType::TestCaseDesign, 1).unwrap();
        }
        assert_eq!(
            reg.create(TaskType::TestCaseDesign, 1),
            Err(TaskError::QueueFull { capacity: 10 })
        );
    }

    #[test]
    fn test_cancelled_task_leaves_queue() {
        let reg = registry(1, 100);
        let first = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        reg.start(&first);
        let queued = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        let after = reg.create(TaskType::TestCaseDesign, 1).unwrap();

        assert!(reg.cancel(&queued));
        assert_eq!(reg.get_status(&queued).unwrap().queue_position, None);
        assert_eq!(reg.get_status(&after).unwrap().queue_position, Some(1));

        reg.complete(&first, done());
        assert_eq!(reg.start_next(), Some(after));
    }

    #[test]
    fn test_prune_finished() {
        let reg = registry(3, 100);
        let finished = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        let live = reg.create(TaskType::TestCaseDesign, 1).unwrap();
        reg.start(&finished);
        reg.complete(&finished, done());

        assert_eq!(reg.prune_finished(chrono::Duration::hours(24)), 0);
        assert_eq!(reg.prune_finished(chrono::Duration::seconds(-1)), 1);
        assert!(reg.get_status(&finished).is_none());
        assert!(reg.get_status(&live).is_some());
    }

    #[test]
    fn test_registries_are_independent() {
        let a = registry(1, 100);
        let b = registry(1, 100);
        let id = a.create(TaskType::TestCaseDesign, 1).unwrap();
        assert!(a.start(&id));
        assert!(b.get_status(&id).is_none());
        assert_eq!(b.running_count(), 0);
    }
}
