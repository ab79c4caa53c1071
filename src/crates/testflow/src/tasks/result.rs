//! Structured task results

use crate::pipeline::model::{
    GenerationSummary, OptimizationOutcome, RequirementAnalysisOutcome, TestCaseOutcome,
    TestPointOutcome,
};
use serde::Serialize;

/// Payload stored on a completed task.
///
/// Serialized without a tag; pollers already know the task type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskResult {
    RequirementAnalysis(RequirementAnalysisOutcome),
    TestPoints(TestPointOutcome),
    TestCases(TestCaseOutcome),
    Optimization(OptimizationOutcome),
    Generation(GenerationSummary),
}

impl From<RequirementAnalysisOutcome> for TaskResult {
    fn from(outcome: RequirementAnalysisOutcome) -> Self {
        TaskResult::RequirementAnalysis(outcome)
    }
}

impl From<TestPointOutcome> for TaskResult {
    fn from(outcome: TestPointOutcome) -> Self {
        TaskResult::TestPoints(outcome)
    }
}

impl From<TestCaseOutcome> for TaskResult {
    fn from(outcome: TestCaseOutcome) -> Self {
        TaskResult::TestCases(outcome)
    }
}

impl From<OptimizationOutcome> for TaskResult {
    fn from(outcome: OptimizationOutcome) -> Self {
        TaskResult::Optimization(outcome)
    }
}

impl From<GenerationSummary> for TaskResult {
    fn from(summary: GenerationSummary) -> Self {
        TaskResult::Generation(summary)
    }
}
