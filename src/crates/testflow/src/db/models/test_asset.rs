//! Stored test points and test cases

use crate::pipeline::model::{TestCaseContent, TestPointInput, TestStep};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestPoint {
    pub id: i64,
    pub requirement_point_id: Option<i64>,
    pub module_id: Option<i64>,
    pub content: String,
    pub test_type: String,
    pub design_method: Option<String>,
    pub priority: String,
    pub created_by_ai: bool,
    pub created_at: String,
}

impl TestPoint {
    /// The form test case design consumes.
    pub fn to_input(&self) -> TestPointInput {
        TestPointInput {
            id: Some(self.id),
            content: self.content.clone(),
            test_type: Some(self.test_type.clone()),
            design_method: self.design_method.clone(),
            priority: Some(self.priority.clone().into()),
            requirement_point_id: self.requirement_point_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TestCase {
    pub id: i64,
    pub test_point_id: Option<i64>,
    pub module_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub preconditions: String,
    /// Stored as JSON text
    pub test_steps: Json<Vec<TestStep>>,
    pub expected_result: String,
    pub design_method: Option<String>,
    pub test_category: String,
    pub priority: String,
    pub created_by_ai: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TestCase {
    /// The editable body sent to the optimizer.
    pub fn to_content(&self) -> TestCaseContent {
        TestCaseContent {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            preconditions: self.preconditions.clone(),
            test_steps: self.test_steps.0.clone(),
            expected_result: self.expected_result.clone(),
        }
    }
}
