//! Task runner
//!
//! Holds the job futures of queued tasks and spawns them when the registry
//! admits them. Every finished job frees a slot, and the runner promotes the
//! next queued task in FIFO order.

use super::progress::TaskProgress;
use super::registry::TaskRegistry;
use super::result::TaskResult;
use super::{TaskError, TaskStatus, TaskType};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

/// A generation job: resolves to the task result or an error message.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<TaskResult, String>> + Send>>;

/// Outcome of a submission, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub task_id: String,
    pub status: TaskStatus,
    pub queue_position: Option<usize>,
}

pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    /// Jobs not yet spawned. The lock also serializes admission decisions
    /// and every change to `handles`.
    pending: Mutex<HashMap<String, JobFuture>>,
    /// Abort handles of spawned jobs, tagged with the spawn that owns them.
    handles: DashMap<String, (u64, AbortHandle)>,
    next_spawn: AtomicU64,
    deadline: Option<Duration>,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            pending: Mutex::new(HashMap::new()),
            handles: DashMap::new(),
            next_spawn: AtomicU64::new(0),
            deadline: None,
        }
    }

    /// Abort jobs that run longer than `deadline` and mark them timed out.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Create a task for `make_job` and run it now or once a slot frees up.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F, Fut>(
        self: &Arc<Self>,
        task_type: TaskType,
        total_batches: usize,
        make_job: F,
    ) -> Result<Submission, TaskError>
    where
        F: FnOnce(TaskProgress) -> Fut,
        Fut: Future<Output = Result<TaskResult, String>> + Send + 'static,
    {
        let task_id = {
            let mut pending = self.pending.lock();
            let task_id = self.registry.create(task_type, total_batches)?;
            let progress = TaskProgress::new(Arc::clone(&self.registry), task_id.clone());
            let job: JobFuture = Box::pin(make_job(progress));

            if self.registry.start(&task_id) {
                self.spawn(task_id.clone(), job);
            } else {
                pending.insert(task_id.clone(), job);
            }
            task_id
        };

        let snapshot = self
            .registry
            .get_status(&task_id)
            .ok_or_else(|| TaskError::NotFound(task_id.clone()))?;
        Ok(Submission {
            task_id,
            status: snapshot.task.status,
            queue_position: snapshot.queue_position,
        })
    }

    /// Cancel a pending or running task.
    ///
    /// The registry transition happens first, so a job racing the abort can
    /// no longer complete or fail the task.
    pub fn cancel(self: &Arc<Self>, task_id: &str) -> Result<(), TaskError> {
        match self.registry.status_of(task_id) {
            None => return Err(TaskError::NotFound(task_id.to_string())),
            Some(status) if status.is_terminal() => {
                return Err(TaskError::AlreadyFinished {
                    task_id: task_id.to_string(),
                    status,
                })
            }
            Some(_) => {}
        }

        if !self.registry.cancel(task_id) {
            let status = self.registry.status_of(task_id).unwrap_or(TaskStatus::Cancelled);
            return Err(TaskError::AlreadyFinished {
                task_id: task_id.to_string(),
                status,
            });
        }

        let running = {
            let mut pending = self.pending.lock();
            pending.remove(task_id);
            self.handles.remove(task_id)
        };
        if let Some((_, (_, handle))) = running {
            handle.abort();
            info!(task_id = %task_id, "Aborted running job");
        }
        self.promote();
        Ok(())
    }

    /// Start queued tasks while slots are free.
    pub fn promote(self: &Arc<Self>) {
        let mut pending = self.pending.lock();
        while let Some(task_id) = self.registry.start_next() {
            match pending.remove(&task_id) {
                Some(job) => self.spawn(task_id, job),
                None => {
                    warn!(task_id = %task_id, "Promoted task has no job");
                    self.registry.fail(&task_id, "No job registered for task");
                }
            }
        }
    }

    /// Called after the concurrency settings change.
    pub fn on_config_changed(self: &Arc<Self>) {
        self.promote();
    }

    pub fn running_jobs(&self) -> usize {
        self.handles.len()
    }

    /// Spawn a job and record its abort handle.
    ///
    /// Callers hold the `pending` lock, so `cancel` and the job's own cleanup
    /// only see the handle once it is recorded.
    fn spawn(self: &Arc<Self>, task_id: String, job: JobFuture) {
        let runner = Arc::clone(self);
        let id = task_id.clone();
        let deadline = self.deadline;
        let spawn_id = self.next_spawn.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            if runner.registry.is_terminal(&id) {
                debug!(task_id = %id, "Task finished before its job started");
            } else {
                runner.run(&id, job, deadline).await;
            }

            {
                let _pending = runner.pending.lock();
                runner.handles.remove_if(&id, |_, (owner, _)| *owner == spawn_id);
            }
            runner.promote();
        });

        self.handles.insert(task_id.clone(), (spawn_id, handle.abort_handle()));
        if self.registry.is_terminal(&task_id) {
            handle.abort();
            self.handles.remove(&task_id);
        }
    }

    async fn run(&self, task_id: &str, job: JobFuture, deadline: Option<Duration>) {
        let guarded = AssertUnwindSafe(job).catch_unwind();
        let outcome = match deadline {
            Some(limit) => tokio::time::timeout(limit, guarded).await.ok(),
            None => Some(guarded.await),
        };

        match outcome {
            Some(Ok(Ok(result))) => {
                self.registry.complete(task_id, result);
            }
            Some(Ok(Err(message))) => {
                self.registry.fail(task_id, message);
            }
            Some(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(task_id = %task_id, panic = %message, "Job panicked");
                self.registry.fail(task_id, format!("Job panicked: {}", message));
            }
            None => {
                self.registry.timeout(task_id);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
