//! Stage orchestration
//!
//! Each stage partitions its input into contiguous batches, runs one LLM call
//! per batch through [`run_batches`], and reports scaled progress into the
//! owning task. A failed batch is recorded and its siblings keep going; only a
//! stage with nothing usable fails as a whole.

use super::agents::{AgentHandle, StageAgents};
use super::model::{
    GenerationSummary, OptimizationEntry, OptimizationOutcome, OptimizationStats,
    RequirementAnalysisOutcome, RequirementPointInput, TestCaseContent, TestCaseDraft,
    TestCaseOutcome, TestPointInput, TestPointOutcome,
};
use super::{normalize, prompts, PipelineError, PipelineSettings, PromptCatalog};
use crate::db::repositories::{
    RequirementRepository, SettingsRepository, TestCaseRepository, TestPointRepository,
};
use crate::db::{DatabaseConnection, DatabasePool};
use crate::executor::{
    partition, run_batches, BatchReport, ExecutorConfig, LlmCaller, ProgressSpan,
};
use crate::tasks::{AdmissionGate, TaskProgress};
use async_trait::async_trait;
use llm::ImageUrl;
use std::collections::HashMap;
use tracing::{info, warn};

const ANALYSIS_SPAN: ProgressSpan = ProgressSpan {
    offset: 0.0,
    scale: 0.25,
};
const TEST_POINT_SPAN: ProgressSpan = ProgressSpan {
    offset: 25.0,
    scale: 0.25,
};
const TEST_CASE_SPAN: ProgressSpan = ProgressSpan {
    offset: 50.0,
    scale: 0.25,
};
const OPTIMIZATION_SPAN: ProgressSpan = ProgressSpan {
    offset: 75.0,
    scale: 0.25,
};

/// Persists each designed batch as soon as it is ready.
#[async_trait]
pub trait TestCaseSink: Send + Sync {
    /// Store `cases` and return their stored bodies.
    async fn save(&self, cases: &[TestCaseDraft]) -> Result<Vec<TestCaseContent>, PipelineError>;
}

/// Writes designed cases into `test_cases` under one module.
pub struct DbCaseSink {
    db: DatabaseConnection,
    module_id: Option<i64>,
}

impl DbCaseSink {
    pub fn new(db: DatabaseConnection, module_id: Option<i64>) -> Self {
        Self { db, module_id }
    }
}

#[async_trait]
impl TestCaseSink for DbCaseSink {
    async fn save(&self, cases: &[TestCaseDraft]) -> Result<Vec<TestCaseContent>, PipelineError> {
        if cases.is_empty() {
            return Ok(Vec::new());
        }
        let stored = TestCaseRepository::insert_many(self.db.pool(), self.module_id, cases).await?;
        Ok(stored.iter().map(|case| case.to_content()).collect())
    }
}

/// Input of one-click generation for a stored requirement file.
#[derive(Debug, Clone)]
pub struct OneClickRequest {
    pub file_id: i64,
    pub images: Vec<ImageUrl>,
}

/// Active test categories and design methods, for the test point prompt.
pub async fn load_prompt_catalog(pool: &DatabasePool) -> Result<PromptCatalog, PipelineError> {
    let categories = SettingsRepository::list_categories(pool, true).await?;
    let methods = SettingsRepository::list_design_methods(pool, true).await?;
    Ok(PromptCatalog {
        categories: categories.into_iter().map(|c| (c.code, c.name)).collect(),
        design_methods: methods.into_iter().map(|m| (m.code, m.name)).collect(),
    })
}

/// Runs the four stages with the live concurrency settings.
#[derive(Debug, Clone)]
pub struct AgentOrchestrator {
    gate: AdmissionGate,
    settings: PipelineSettings,
}

impl AgentOrchestrator {
    pub fn new(gate: AdmissionGate, settings: PipelineSettings) -> Self {
        Self { gate, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// A caller built from the settings as they are right now, so a hot
    /// reload applies from the next stage on.
    fn caller(&self) -> LlmCaller {
        let concurrency = self.gate.config();
        let config = ExecutorConfig::default()
            .with_retry_count(concurrency.retry_count)
            .with_call_timeout(concurrency.task_timeout)
            .with_retry_base_delay(self.settings.retry_base_delay_ms)
            .with_failed_response_dir(self.settings.failed_response_dir.clone());
        LlmCaller::new(&config)
    }

    fn max_parallel(&self) -> usize {
        self.gate.max_concurrent()
    }

    /// Split a requirement document into requirement points.
    ///
    /// An empty answer is retried once with a reinforced prompt.
    pub async fn analyze_requirements(
        &self,
        agent: &AgentHandle,
        content: &str,
        images: &[ImageUrl],
        progress: &TaskProgress,
        span: ProgressSpan,
    ) -> Result<RequirementAnalysisOutcome, PipelineError> {
        if content.trim().is_empty() && images.is_empty() {
            return Err(PipelineError::InvalidInput("requirement content is empty".into()));
        }

        let caller = self.caller();
        progress.set(span.start(), "Analyzing requirements");

        let prompt = prompts::requirement_analysis(content);
        let request = agent.request(prompt.clone(), images);
        let value = caller
            .call_json(agent.client.as_ref(), &request, "requirement_analysis")
            .await?;
        let mut points = normalize::requirement_points(&value);
        let mut retried = false;

        if points.is_empty() {
            warn!(
                agent = %agent.name,
                "No requirement points returned, retrying with reinforced prompt"
            );
            retried = true;
            let reinforced = format!("{}{}", prompt, prompts::REINFORCEMENT);
            let request = agent.request(reinforced, images);
            let value = caller
                .call_json(agent.client.as_ref(), &request, "requirement_analysis")
                .await?;
            points = normalize::requirement_points(&value);
        }

        if points.is_empty() {
            return Err(PipelineError::EmptyStage("Requirement analysis".into()));
        }

        info!(count = points.len(), retried = retried, "Requirement analysis finished");
        progress.set(span.end(), format!("Extracted {} requirement points", points.len()));

        Ok(RequirementAnalysisOutcome {
            requirement_points: points,
            retried,
        })
    }

    /// Derive test points, one call per batch of requirement points.
    pub async fn generate_test_points(
        &self,
        agent: &AgentHandle,
        requirement_points: Vec<RequirementPointInput>,
        catalog: &PromptCatalog,
        progress: &TaskProgress,
        span: ProgressSpan,
    ) -> Result<TestPointOutcome, PipelineError> {
        let requirement_points: Vec<_> = requirement_points
            .into_iter()
            .filter(|rp| !rp.content.trim().is_empty())
            .collect();
        if requirement_points.is_empty() {
            return Err(PipelineError::InvalidInput("no requirement points to process".into()));
        }

        let caller = self.caller();
        let caller = &caller;
        let batches = partition(&requirement_points, self.settings.test_point_batch_size);
        let total = batches.len();
        progress.batches(span, 0, total, format!("Generating test points: 0/{} batches", total));

        let report = run_batches(
            "test_point_generation",
            batches,
            self.max_parallel(),
            move |_index, batch: Vec<RequirementPointInput>| async move {
                ensure_running(progress)?;
                let request = agent.request(prompts::test_points_batch(&batch, catalog), &[]);
                let value = caller
                    .call_json(agent.client.as_ref(), &request, "test_point_generation")
                    .await?;
                let ids: Vec<Option<i64>> = batch.iter().map(|rp| rp.id).collect();
                Ok::<_, PipelineError>(normalize::test_points_for_batch(&value, &ids))
            },
            |done, total| {
                let message = format!("Generating test points: {}/{} batches", done, total);
                progress.batches(span, done, total, message)
            },
        )
        .await;

        ensure_some_succeeded("Test point generation", &report)?;
        let failed_batches = report.failures.len();
        let test_points: Vec<_> = report
            .completed
            .into_iter()
            .flat_map(|(_, points)| points)
            .collect();

        info!(
            count = test_points.len(),
            total_batches = total,
            failed_batches = failed_batches,
            "Test points generated"
        );
        Ok(TestPointOutcome {
            test_points,
            total_batches: total,
            failed_batches,
            saved_count: 0,
        })
    }

    /// Design one test case per test point, in batches.
    ///
    /// Cases stay aligned with their test point by position. Empty slots are
    /// counted in `missing_count`; extra cases are dropped.
    pub async fn design_test_cases(
        &self,
        agent: &AgentHandle,
        test_points: Vec<TestPointInput>,
        requirement_content: &str,
        progress: &TaskProgress,
        span: ProgressSpan,
        sink: Option<&dyn TestCaseSink>,
    ) -> Result<TestCaseOutcome, PipelineError> {
        if test_points.is_empty() {
            return Err(PipelineError::InvalidInput("no test points to process".into()));
        }

        let caller = self.caller();
        let caller = &caller;
        let batches = partition(&test_points, self.settings.test_case_batch_size);
        let total = batches.len();
        progress.batches(span, 0, total, format!("Designing test cases: 0/{} batches", total));

        let report = run_batches(
            "test_case_design",
            batches,
            self.max_parallel(),
            move |index, batch: Vec<TestPointInput>| async move {
                ensure_running(progress)?;
                let prompt = prompts::test_case_design(&batch, requirement_content);
                let request = agent.request(prompt, &[]);
                let value = caller
                    .call_json(agent.client.as_ref(), &request, "test_case_design")
                    .await?;

                let aligned = normalize::aligned_test_cases(&value, batch.len());
                if aligned.surplus > 0 {
                    warn!(
                        batch = index + 1,
                        surplus = aligned.surplus,
                        "Dropping surplus test cases"
                    );
                }
                let missing = aligned.missing();
                if missing > 0 {
                    warn!(
                        batch = index + 1,
                        missing = missing,
                        "Model returned fewer test cases than test points"
                    );
                }

                let cases: Vec<TestCaseDraft> = aligned
                    .slots
                    .into_iter()
                    .zip(batch.iter())
                    .filter_map(|(slot, point)| slot.map(|case| inherit(case, point)))
                    .collect();

                let saved = match sink {
                    Some(sink) => {
                        ensure_running(progress)?;
                        sink.save(&cases).await?
                    }
                    None => Vec::new(),
                };
                Ok::<_, PipelineError>((cases, missing, saved))
            },
            |done, total| {
                let message = format!("Designing test cases: {}/{} batches", done, total);
                progress.batches(span, done, total, message)
            },
        )
        .await;

        ensure_some_succeeded("Test case design", &report)?;
        let failed_batches = report.failures.len();
        let mut outcome = TestCaseOutcome {
            test_cases: Vec::new(),
            total_batches: total,
            failed_batches,
            missing_count: 0,
            saved_count: 0,
            saved: Vec::new(),
        };
        for (_, (cases, missing, saved)) in report.completed {
            outcome.test_cases.extend(cases);
            outcome.missing_count += missing;
            outcome.saved_count += saved.len();
            outcome.saved.extend(saved);
        }

        info!(
            count = outcome.test_cases.len(),
            missing = outcome.missing_count,
            saved = outcome.saved_count,
            failed_batches = failed_batches,
            "Test cases designed"
        );
        Ok(outcome)
    }

    /// Rewrite test cases for clarity, matching answers back by id.
    pub async fn optimize_test_cases(
        &self,
        agent: &AgentHandle,
        test_cases: Vec<TestCaseContent>,
        progress: &TaskProgress,
        span: ProgressSpan,
    ) -> Result<OptimizationOutcome, PipelineError> {
        if test_cases.is_empty() {
            return Err(PipelineError::InvalidInput("no test cases to optimize".into()));
        }

        let caller = self.caller();
        let caller = &caller;
        let batches = partition(&test_cases, self.settings.optimization_batch_size);
        let batch_ids: Vec<Vec<i64>> = batches
            .iter()
            .map(|batch| batch.iter().map(|case| case.id).collect())
            .collect();
        let total = batches.len();
        progress.batches(span, 0, total, format!("Optimizing test cases: 0/{} batches", total));

        let report = run_batches(
            "test_case_optimization",
            batches,
            self.max_parallel(),
            move |_index, batch: Vec<TestCaseContent>| async move {
                ensure_running(progress)?;
                let request = agent.request(prompts::optimize_test_cases(&batch), &[]);
                let value = caller
                    .call_json(agent.client.as_ref(), &request, "test_case_optimization")
                    .await?;

                let mut optimized: HashMap<i64, TestCaseContent> =
                    normalize::optimized_cases(&value)
                        .into_iter()
                        .map(|case| (case.id, case))
                        .collect();
                let entries = batch
                    .iter()
                    .map(|case| match optimized.remove(&case.id) {
                        Some(found) => OptimizationEntry::success(found),
                        None => {
                            OptimizationEntry::failure(case.id, "missing from optimizer response")
                        }
                    })
                    .collect::<Vec<_>>();
                Ok::<_, PipelineError>(entries)
            },
            |done, total| {
                let message = format!("Optimizing test cases: {}/{} batches", done, total);
                progress.batches(span, done, total, message)
            },
        )
        .await;

        let mut results: Vec<OptimizationEntry> = Vec::with_capacity(test_cases.len());
        for (_, entries) in report.completed {
            results.extend(entries);
        }
        for failure in &report.failures {
            if let Some(ids) = batch_ids.get(failure.index) {
                results.extend(
                    ids.iter()
                        .map(|id| OptimizationEntry::failure(*id, failure.error.clone())),
                );
            }
        }

        let optimized_cases: Vec<TestCaseContent> = results
            .iter()
            .filter_map(|e| e.optimized.clone())
            .collect();
        let statistics = OptimizationStats {
            total: results.len(),
            success_count: optimized_cases.len(),
            failure_count: results.len() - optimized_cases.len(),
        };

        info!(
            total = statistics.total,
            succeeded = statistics.success_count,
            failed = statistics.failure_count,
            "Test cases optimized"
        );
        Ok(OptimizationOutcome {
            results,
            optimized_cases,
            statistics,
            applied_count: 0,
        })
    }

    /// Requirement file to optimized, stored test cases.
    ///
    /// Existing requirement points of the file are replaced; their test points
    /// and test cases go with them through the cascade.
    pub async fn run_one_click(
        &self,
        db: &DatabaseConnection,
        agents: &StageAgents,
        request: &OneClickRequest,
        progress: &TaskProgress,
    ) -> Result<GenerationSummary, PipelineError> {
        let pool = db.pool();
        let file = RequirementRepository::get_file(pool, request.file_id)
            .await?
            .ok_or_else(|| {
                PipelineError::NotFound(format!("requirement file {}", request.file_id))
            })?;
        let mut summary = GenerationSummary::default();

        let analysis = self
            .analyze_requirements(
                &agents.splitter,
                &file.extracted_content,
                &request.images,
                progress,
                ANALYSIS_SPAN,
            )
            .await?;

        ensure_running(progress)?;
        let removed = RequirementRepository::delete_points_by_file(pool, file.id).await?;
        if removed > 0 {
            info!(file_id = file.id, removed = removed, "Replaced previous requirement points");
        }
        let stored_points = RequirementRepository::insert_points(
            pool,
            file.id,
            file.module_id,
            &analysis.requirement_points,
        )
        .await?;
        summary.requirement_points_count = stored_points.len();

        let catalog = load_prompt_catalog(pool).await?;
        let inputs = stored_points
            .iter()
            .map(|rp| RequirementPointInput {
                id: Some(rp.id),
                content: rp.content.clone(),
            })
            .collect();
        let generated = self
            .generate_test_points(
                &agents.point_generator,
                inputs,
                &catalog,
                progress,
                TEST_POINT_SPAN,
            )
            .await?;
        if generated.test_points.is_empty() {
            return Err(PipelineError::EmptyStage("Test point generation".into()));
        }

        ensure_running(progress)?;
        let stored_test_points =
            TestPointRepository::insert_many(pool, file.module_id, &generated.test_points).await?;
        summary.test_points_count = stored_test_points.len();

        let sink = DbCaseSink::new(db.clone(), file.module_id);
        let designed = self
            .design_test_cases(
                &agents.case_designer,
                stored_test_points.iter().map(|tp| tp.to_input()).collect(),
                &file.extracted_content,
                progress,
                TEST_CASE_SPAN,
                Some(&sink),
            )
            .await?;
        summary.test_cases_count = designed.saved_count;

        if designed.saved.is_empty() {
            info!(file_id = file.id, "No test cases to optimize");
            return Ok(summary);
        }

        let optimized = self
            .optimize_test_cases(&agents.optimizer, designed.saved, progress, OPTIMIZATION_SPAN)
            .await?;
        ensure_running(progress)?;
        for case in &optimized.optimized_cases {
            if TestCaseRepository::apply_content(pool, case).await? {
                summary.optimized_count += 1;
            }
        }

        info!(
            file_id = file.id,
            requirement_points = summary.requirement_points_count,
            test_points = summary.test_points_count,
            test_cases = summary.test_cases_count,
            optimized = summary.optimized_count,
            "One-click generation finished"
        );
        Ok(summary)
    }
}

/// Carry the test point's link and classification onto its case.
fn inherit(mut case: TestCaseDraft, point: &TestPointInput) -> TestCaseDraft {
    case.test_point_id = point.id;
    if let Some(test_type) = point.test_type.as_ref().filter(|t| !t.trim().is_empty()) {
        case.test_type = test_type.clone();
    }
    if point.design_method.is_some() {
        case.design_method = point.design_method.clone();
    }
    if let Some(priority) = point.priority {
        case.priority = priority;
    }
    case
}

fn ensure_running(progress: &TaskProgress) -> Result<(), PipelineError> {
    if progress.is_finished() {
        return Err(PipelineError::stage_failed("Generation", "task is no longer running"));
    }
    Ok(())
}

fn ensure_some_succeeded<O>(stage: &str, report: &BatchReport<O>) -> Result<(), PipelineError> {
    if report.total_batches > 0 && report.succeeded() == 0 {
        let cause = report.first_error().unwrap_or("unknown error");
        return Err(PipelineError::stage_failed(
            stage,
            format!("all {} batches failed: {}", report.total_batches, cause),
        ));
    }
    Ok(())
}
