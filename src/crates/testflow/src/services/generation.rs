//! Launching generation stages as background tasks
//!
//! Agents are resolved and input is checked before a task is created, so an
//! unusable request is rejected up front instead of producing a failed task.
//! Every finished stage writes a `task_logs` row.

use crate::db::models::NewTaskLog;
use crate::db::repositories::{
    RequirementRepository, TaskLogRepository, TestCaseRepository, TestPointRepository,
};
use crate::db::DatabaseConnection;
use crate::executor::{batch_count, ProgressSpan};
use crate::pipeline::orchestrator::load_prompt_catalog;
use crate::pipeline::{
    model::{RequirementPointInput, TestCaseContent, TestPointInput},
    AgentDirectory, AgentKind, AgentOrchestrator, DbCaseSink, OneClickRequest, PipelineError,
    StageAgentIds,
};
use crate::tasks::{Submission, TaskError, TaskProgress, TaskResult, TaskRunner, TaskType};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

const SUMMARY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

/// Entry point for all asynchronous generation requests.
#[derive(Clone)]
pub struct GenerationService {
    db: DatabaseConnection,
    runner: Arc<TaskRunner>,
    orchestrator: AgentOrchestrator,
    directory: AgentDirectory,
}

impl GenerationService {
    pub fn new(
        db: DatabaseConnection,
        runner: Arc<TaskRunner>,
        orchestrator: AgentOrchestrator,
        directory: AgentDirectory,
    ) -> Self {
        Self {
            db,
            runner,
            orchestrator,
            directory,
        }
    }

    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.runner
    }

    pub async fn launch_requirement_analysis(
        &self,
        content: String,
        agent_id: Option<i64>,
        image_paths: Vec<PathBuf>,
    ) -> Result<Submission, GenerationError> {
        if content.trim().is_empty() && image_paths.is_empty() {
            let message = "requirement_content must not be empty";
            return Err(PipelineError::InvalidInput(message.into()).into());
        }
        let agent = self.directory.resolve(AgentKind::RequirementSplitter, agent_id).await?;
        let orchestrator = self.orchestrator.clone();
        let input = format!("{} ({} images)", truncate(&content), image_paths.len());

        self.submit_logged(
            TaskType::RequirementAnalysis,
            0,
            agent.agent_id,
            input,
            move |progress| async move {
                let images = llm::encode_images(&image_paths).await;
                let outcome = orchestrator
                    .analyze_requirements(
                        &agent,
                        &content,
                        &images,
                        &progress,
                        ProgressSpan::FULL,
                    )
                    .await?;
                Ok(outcome.into())
            },
        )
    }

    /// With a module id the generated points are stored, replacing earlier
    /// points of the same requirement points.
    pub async fn launch_test_point_generation(
        &self,
        requirement_points: Vec<RequirementPointInput>,
        agent_id: Option<i64>,
        module_id: Option<i64>,
    ) -> Result<Submission, GenerationError> {
        if requirement_points.iter().all(|rp| rp.content.trim().is_empty()) {
            let message = "requirement_points must not be empty";
            return Err(PipelineError::InvalidInput(message.into()).into());
        }
        let agent = self.directory.resolve(AgentKind::TestPointGenerator, agent_id).await?;
        let orchestrator = self.orchestrator.clone();
        let db = self.db.clone();
        let total = batch_count(
            requirement_points.len(),
            orchestrator.settings().test_point_batch_size,
        );
        let input = format!("{} requirement points", requirement_points.len());

        self.submit_logged(
            TaskType::TestPointGeneration,
            total,
            agent.agent_id,
            input,
            move |progress| async move {
                let catalog = load_prompt_catalog(db.pool()).await?;
                let source_ids: Vec<i64> =
                    requirement_points.iter().filter_map(|rp| rp.id).collect();
                let mut outcome = orchestrator
                    .generate_test_points(
                        &agent,
                        requirement_points,
                        &catalog,
                        &progress,
                        ProgressSpan::FULL,
                    )
                    .await?;

                if module_id.is_some() && !progress.is_finished() {
                    let pool = db.pool();
                    let removed =
                        TestPointRepository::delete_by_requirement_points(pool, &source_ids).await?;
                    let stored =
                        TestPointRepository::insert_many(pool, module_id, &outcome.test_points)
                            .await?;
                    outcome.saved_count = stored.len();
                    info!(removed = removed, saved = stored.len(), "Test points stored");
                }
                Ok(outcome.into())
            },
        )
    }

    /// With a module id each finished batch is stored at once, and the
    /// module's requirement documents are sent as context.
    pub async fn launch_test_case_design(
        &self,
        test_points: Vec<TestPointInput>,
        agent_id: Option<i64>,
        module_id: Option<i64>,
    ) -> Result<Submission, GenerationError> {
        if test_points.is_empty() {
            return Err(PipelineError::InvalidInput("test_points must not be empty".into()).into());
        }
        let agent = self.directory.resolve(AgentKind::TestCaseDesigner, agent_id).await?;
        let orchestrator = self.orchestrator.clone();
        let db = self.db.clone();
        let total = batch_count(test_points.len(), orchestrator.settings().test_case_batch_size);
        let input = format!("{} test points", test_points.len());

        self.submit_logged(
            TaskType::TestCaseDesign,
            total,
            agent.agent_id,
            input,
            move |progress| async move {
                let context = match module_id {
                    Some(module_id) => {
                        RequirementRepository::module_context(db.pool(), module_id).await?
                    }
                    None => String::new(),
                };
                let sink = module_id.map(|id| DbCaseSink::new(db.clone(), Some(id)));
                let outcome = orchestrator
                    .design_test_cases(
                        &agent,
                        test_points,
                        &context,
                        &progress,
                        ProgressSpan::FULL,
                        sink.as_ref().map(|s| s as &dyn crate::pipeline::TestCaseSink),
                    )
                    .await?;
                Ok(outcome.into())
            },
        )
    }

    /// With `auto_save` the optimized bodies overwrite the stored cases.
    pub async fn launch_test_case_optimization(
        &self,
        test_cases: Vec<TestCaseContent>,
        agent_id: Option<i64>,
        auto_save: bool,
    ) -> Result<Submission, GenerationError> {
        if test_cases.is_empty() {
            return Err(PipelineError::InvalidInput("test_cases must not be empty".into()).into());
        }
        let agent = self.directory.resolve(AgentKind::TestCaseOptimizer, agent_id).await?;
        let orchestrator = self.orchestrator.clone();
        let db = self.db.clone();
        let total = batch_count(test_cases.len(), orchestrator.settings().optimization_batch_size);
        let input = format!("{} test cases, auto_save={}", test_cases.len(), auto_save);

        self.submit_logged(
            TaskType::TestCaseOptimization,
            total,
            agent.agent_id,
            input,
            move |progress| async move {
                let mut outcome = orchestrator
                    .optimize_test_cases(&agent, test_cases, &progress, ProgressSpan::FULL)
                    .await?;

                if auto_save && !progress.is_finished() {
                    for case in &outcome.optimized_cases {
                        if TestCaseRepository::apply_content(db.pool(), case).await? {
                            outcome.applied_count += 1;
                        }
                    }
                }
                Ok(outcome.into())
            },
        )
    }

    /// Run every stage for a stored requirement file.
    pub async fn launch_one_click(
        &self,
        file_id: i64,
        agent_ids: StageAgentIds,
        image_paths: Vec<PathBuf>,
    ) -> Result<Submission, GenerationError> {
        let file = RequirementRepository::get_file(self.db.pool(), file_id)
            .await
            .map_err(PipelineError::from)?;
        if file.is_none() {
            return Err(PipelineError::NotFound(format!("requirement file {}", file_id)).into());
        }
        let agents = self.directory.resolve_all(&agent_ids).await?;
        let orchestrator = self.orchestrator.clone();
        let db = self.db.clone();
        let input = format!("requirement file {} ({} images)", file_id, image_paths.len());

        self.submit_logged(
            TaskType::OneClickGeneration,
            0,
            agents.splitter.agent_id,
            input,
            move |progress| async move {
                let request = OneClickRequest {
                    file_id,
                    images: llm::encode_images(&image_paths).await,
                };
                let summary = orchestrator.run_one_click(&db, &agents, &request, &progress).await?;
                Ok(summary.into())
            },
        )
    }

    fn submit_logged<F, Fut>(
        &self,
        task_type: TaskType,
        total_batches: usize,
        agent_id: Option<i64>,
        input_summary: String,
        job: F,
    ) -> Result<Submission, GenerationError>
    where
        F: FnOnce(TaskProgress) -> Fut,
        Fut: Future<Output = Result<TaskResult, PipelineError>> + Send + 'static,
    {
        let db = self.db.clone();
        let submission = self.runner.submit(task_type, total_batches, move |progress| {
            let task_id = progress.task_id().map(String::from);
            let job = job(progress);
            async move {
                let started = Instant::now();
                let outcome = job.await;
                let (status, output_summary, error_message) = match &outcome {
                    Ok(result) => ("completed", Some(summarize(result)), None),
                    Err(e) => ("failed", None, Some(e.to_string())),
                };
                let log = NewTaskLog {
                    task_id,
                    agent_id,
                    task_type: task_type.as_str().to_string(),
                    status: status.to_string(),
                    input_summary: Some(input_summary),
                    output_summary,
                    error_message,
                    duration_ms: started.elapsed().as_millis() as i64,
                };
                if let Err(e) = TaskLogRepository::insert(db.pool(), &log).await {
                    warn!(error = %e, "Failed to write task log");
                }
                outcome.map_err(|e| e.to_string())
            }
        })?;
        info!(
            task_id = %submission.task_id,
            task_type = %task_type,
            status = %submission.status,
            "Task submitted"
        );
        Ok(submission)
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= SUMMARY_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(SUMMARY_LIMIT).collect();
    cut.push_str("...");
    cut
}

fn summarize(result: &TaskResult) -> String {
    match result {
        TaskResult::RequirementAnalysis(o) => {
            format!("{} requirement points", o.requirement_points.len())
        }
        TaskResult::TestPoints(o) => format!(
            "{} test points, {}/{} batches failed",
            o.test_points.len(),
            o.failed_batches,
            o.total_batches
        ),
        TaskResult::TestCases(o) => format!(
            "{} test cases, {} missing, {} saved",
            o.test_cases.len(),
            o.missing_count,
            o.saved_count
        ),
        TaskResult::Optimization(o) => format!(
            "{}/{} optimized, {} applied",
            o.statistics.success_count, o.statistics.total, o.applied_count
        ),
        TaskResult::Generation(s) => format!(
            "{} requirement points, {} test points, {} test cases, {} optimized",
            s.requirement_points_count, s.test_points_count, s.test_cases_count, s.optimized_count
        ),
    }
}
