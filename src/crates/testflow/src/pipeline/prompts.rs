//! User prompts for the four stages
//!
//! System prompts belong to the agent records; these templates carry the
//! per-call payload and pin down the JSON shape each stage parses.

use super::model::{RequirementPointInput, TestCaseContent, TestPointInput};

/// Appended when the first analysis call produced no requirement points.
pub const REINFORCEMENT: &str = "\n\nImportant: return at least one requirement point, \
even if the document is short.";

const NO_REQUIREMENT_DOC: &str = "(no requirement document)";

/// Test categories and design methods offered to the test point generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptCatalog {
    /// `(code, name)` pairs
    pub categories: Vec<(String, String)>,
    pub design_methods: Vec<(String, String)>,
}

impl PromptCatalog {
    pub fn categories_text(&self) -> String {
        if self.categories.is_empty() {
            return "- functional: Functional testing".to_string();
        }
        render_pairs(&self.categories)
    }

    pub fn design_methods_text(&self) -> String {
        if self.design_methods.is_empty() {
            return "- equivalence_class: Equivalence class partitioning\n\
                    - boundary_value: Boundary value analysis"
                .to_string();
        }
        render_pairs(&self.design_methods)
    }
}

fn render_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(code, name)| format!("- {}: {}", code, name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn requirement_analysis(content: &str) -> String {
    format!(
        "Split the following requirement document into independent, testable \
         requirement points.\n\n\
         Requirement document:\n{content}\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"requirement_points\": [{{\"content\": \"...\", \"module\": \"...\", \
         \"priority\": \"high|medium|low\", \"order_index\": 1}}]}}",
        content = content
    )
}

pub fn test_points(requirement: &str, catalog: &PromptCatalog) -> String {
    format!(
        "Derive test points for the requirement point below.\n\n\
         Requirement point:\n{requirement}\n\n\
         Allowed test types (use the code):\n{categories}\n\n\
         Allowed design methods (use the code):\n{methods}\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"test_points\": [{{\"content\": \"...\", \"test_type\": \"<code>\", \
         \"design_method\": \"<code>\", \"priority\": \"high|medium|low\"}}]}}",
        requirement = requirement,
        categories = catalog.categories_text(),
        methods = catalog.design_methods_text()
    )
}

/// Prompt for several requirement points in one call. A single point uses
/// the plain [`test_points`] prompt.
pub fn test_points_batch(
    requirements: &[RequirementPointInput],
    catalog: &PromptCatalog,
) -> String {
    if let [only] = requirements {
        return test_points(&only.content, catalog);
    }
    let numbered = requirements
        .iter()
        .enumerate()
        .map(|(i, rp)| format!("{}. {}", i + 1, rp.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Derive test points for each of the {count} numbered requirement points below.\n\n\
         Requirement points:\n{numbered}\n\n\
         Allowed test types (use the code):\n{categories}\n\n\
         Allowed design methods (use the code):\n{methods}\n\n\
         Respond with JSON only, in this shape. `requirement_index` is the number of the \
         requirement point the test point belongs to:\n\
         {{\"test_points\": [{{\"requirement_index\": 1, \"content\": \"...\", \
         \"test_type\": \"<code>\", \
         \"design_method\": \"<code>\", \"priority\": \"high|medium|low\"}}]}}",
        count = requirements.len(),
        numbered = numbered,
        categories = catalog.categories_text(),
        methods = catalog.design_methods_text()
    )
}

pub fn test_case_design(test_points: &[TestPointInput], requirement_content: &str) -> String {
    let points = serde_json::to_string_pretty(test_points).unwrap_or_else(|_| "[]".to_string());
    let context = if requirement_content.trim().is_empty() {
        NO_REQUIREMENT_DOC
    } else {
        requirement_content
    };
    format!(
        "Design exactly one test case for each of the {count} test points below, \
         in the same order.\n\n\
         Test points:\n{points}\n\n\
         Requirement context:\n{context}\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"test_cases\": [{{\"title\": \"...\", \"description\": \"...\", \
         \"preconditions\": \"...\", \
         \"test_steps\": [{{\"step\": 1, \"action\": \"...\", \"expected\": \"...\"}}], \
         \"expected_result\": \"...\"}}]}}",
        count = test_points.len(),
        points = points,
        context = context
    )
}

pub fn optimize_test_cases(cases: &[TestCaseContent]) -> String {
    let cases = serde_json::to_string_pretty(cases).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Improve the clarity, completeness and executability of the test cases below. \
         Keep every id unchanged.\n\n\
         Test cases:\n{cases}\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"optimized_cases\": [{{\"id\": 1, \"title\": \"...\", \"description\": \"...\", \
         \"preconditions\": \"...\", \"test_steps\": [{{\"step\": 1, \"action\": \"...\", \
         \"expected\": \"...\"}}], \"expected_result\": \"...\"}}]}}",
        cases = cases
    )
}
