//! Typed payloads flowing through the generation stages

use serde::{Deserialize, Serialize};

/// Requirement, test point and test case priority.
///
/// Deserializes leniently: `P0`, `HIGH`, `H` and `高` all mean high, and
/// anything unrecognised falls back to medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "P0" | "HIGH" | "H" | "高" => Priority::High,
            "P2" | "LOW" | "L" | "低" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        Priority::parse(&raw)
    }
}

/// One step of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestStep {
    pub step: u32,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub expected: String,
}

/// Requirement point produced by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementPointDraft {
    pub content: String,
    pub module: Option<String>,
    pub priority: Priority,
    pub order_index: i64,
}

/// Requirement point handed to test point generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementPointInput {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
}

/// Test point produced by the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPointDraft {
    pub requirement_point_id: Option<i64>,
    pub content: String,
    pub test_type: String,
    pub design_method: Option<String>,
    pub priority: Priority,
}

/// Test point handed to test case design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPointInput {
    #[serde(default)]
    pub id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub test_type: Option<String>,
    #[serde(default)]
    pub design_method: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub requirement_point_id: Option<i64>,
}

/// Test case produced by the design stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseDraft {
    pub test_point_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub preconditions: String,
    pub test_steps: Vec<TestStep>,
    pub expected_result: String,
    pub design_method: Option<String>,
    pub test_type: String,
    pub priority: Priority,
}

/// The editable body of a stored test case.
///
/// Sent to the optimizer and returned by it, matched by `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseContent {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub preconditions: String,
    #[serde(default)]
    pub test_steps: Vec<TestStep>,
    #[serde(default)]
    pub expected_result: String,
}

/// Per-case outcome of the optimization stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationEntry {
    pub original_id: i64,
    pub success: bool,
    pub optimized: Option<TestCaseContent>,
    pub error: Option<String>,
}

impl OptimizationEntry {
    pub fn success(optimized: TestCaseContent) -> Self {
        Self {
            original_id: optimized.id,
            success: true,
            optimized: Some(optimized),
            error: None,
        }
    }

    pub fn failure(original_id: i64, error: impl Into<String>) -> Self {
        Self {
            original_id,
            success: false,
            optimized: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OptimizationStats {
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementAnalysisOutcome {
    pub requirement_points: Vec<RequirementPointDraft>,
    /// The reinforced prompt was needed
    pub retried: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestPointOutcome {
    pub test_points: Vec<TestPointDraft>,
    pub total_batches: usize,
    pub failed_batches: usize,
    pub saved_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCaseOutcome {
    pub test_cases: Vec<TestCaseDraft>,
    pub total_batches: usize,
    pub failed_batches: usize,
    /// Slots the model left empty
    pub missing_count: usize,
    pub saved_count: usize,
    /// Stored bodies, ready for optimization
    #[serde(skip)]
    pub saved: Vec<TestCaseContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationOutcome {
    pub results: Vec<OptimizationEntry>,
    pub optimized_cases: Vec<TestCaseContent>,
    pub statistics: OptimizationStats,
    pub applied_count: usize,
}

/// Counts reported by one-click generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GenerationSummary {
    pub requirement_points_count: usize,
    pub test_points_count: usize,
    pub test_cases_count: usize,
    pub optimized_count: usize,
}
