//! Turning model JSON into typed drafts
//!
//! Models are inconsistent about shapes: text fields arrive as lists, steps
//! use localized keys, ids come back as strings. Everything here is lenient
//! and drops only items that carry no usable content.

use super::model::{
    Priority, RequirementPointDraft, TestCaseContent, TestCaseDraft, TestPointDraft, TestStep,
};
use serde_json::Value;

/// Render a loosely typed field as text. Lists are joined with newlines.
pub fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    let rendered = text(value);
    if rendered.trim().is_empty() {
        None
    } else {
        Some(rendered)
    }
}

/// First non-empty string among `keys`.
fn first_of(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text(item.get(*key)))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn priority_of(item: &Value) -> Priority {
    item.get("priority")
        .and_then(Value::as_str)
        .map(Priority::parse)
        .unwrap_or_default()
}

/// Accept integer ids, and numeric strings.
pub fn id_of(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize test steps to `{step, action, expected}`.
pub fn steps(value: Option<&Value>) -> Vec<TestStep> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let fallback = u32::try_from(i + 1).unwrap_or(u32::MAX);
                match item {
                    Value::Object(_) => Some(TestStep {
                        step: item
                            .get("step")
                            .and_then(|v| id_of(Some(v)))
                            .and_then(|n| u32::try_from(n).ok())
                            .filter(|n| *n > 0)
                            .unwrap_or(fallback),
                        action: first_of(item, &["action", "操作"]),
                        expected: first_of(item, &["expected", "预期结果", "expected_result"]),
                    }),
                    Value::String(s) => Some(TestStep {
                        step: fallback,
                        action: s.clone(),
                        expected: String::new(),
                    }),
                    _ => None,
                }
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![TestStep {
            step: 1,
            action: s.clone(),
            expected: String::new(),
        }],
        _ => Vec::new(),
    }
}

fn list<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Items of `{"requirement_points": [...]}`.
pub fn requirement_points(value: &Value) -> Vec<RequirementPointDraft> {
    list(value, "requirement_points")
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let content = match item {
                Value::String(s) => s.clone(),
                _ => text(item.get("content")),
            };
            if content.trim().is_empty() {
                return None;
            }
            Some(RequirementPointDraft {
                content,
                module: optional_text(item.get("module")),
                priority: priority_of(item),
                order_index: item
                    .get("order_index")
                    .and_then(Value::as_i64)
                    .unwrap_or(i as i64),
            })
        })
        .collect()
}

/// Items of `{"test_points": [...]}`, linked to their source requirement point.
pub fn test_points(value: &Value, requirement_point_id: Option<i64>) -> Vec<TestPointDraft> {
    list(value, "test_points")
        .iter()
        .filter_map(|item| test_point(item, requirement_point_id))
        .collect()
}

/// Test points for a batch of several requirement points.
///
/// Items are linked through their 1-based `requirement_index`; items without a
/// valid index go to the first requirement point of the batch.
pub fn test_points_for_batch(
    value: &Value,
    requirement_point_ids: &[Option<i64>],
) -> Vec<TestPointDraft> {
    if requirement_point_ids.len() <= 1 {
        return test_points(value, requirement_point_ids.first().copied().flatten());
    }
    list(value, "test_points")
        .iter()
        .filter_map(|item| {
            let index = id_of(item.get("requirement_index"))
                .filter(|i| *i >= 1 && (*i as usize) <= requirement_point_ids.len())
                .map(|i| i as usize - 1)
                .unwrap_or(0);
            test_point(item, requirement_point_ids[index])
        })
        .collect()
}

fn test_point(item: &Value, requirement_point_id: Option<i64>) -> Option<TestPointDraft> {
    let content = match item {
        Value::String(s) => s.clone(),
        _ => text(item.get("content")),
    };
    if content.trim().is_empty() {
        return None;
    }
    Some(TestPointDraft {
        requirement_point_id,
        content,
        test_type: optional_text(item.get("test_type")).unwrap_or_else(|| "functional".to_string()),
        design_method: optional_text(item.get("design_method")),
        priority: priority_of(item),
    })
}

/// One generated test case, or None when it has no title.
pub fn test_case(item: &Value) -> Option<TestCaseDraft> {
    if !item.is_object() {
        return None;
    }
    let title = text(item.get("title"));
    if title.trim().is_empty() {
        return None;
    }
    Some(TestCaseDraft {
        test_point_id: None,
        title,
        description: text(item.get("description")),
        preconditions: text(item.get("preconditions")),
        test_steps: steps(item.get("test_steps")),
        expected_result: text(item.get("expected_result")),
        design_method: optional_text(item.get("design_method")),
        test_type: optional_text(item.get("test_type")).unwrap_or_else(|| "functional".to_string()),
        priority: priority_of(item),
    })
}

/// Test cases aligned by position with the `expected` inputs of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedCases {
    /// One slot per input; None where the model returned nothing usable
    pub slots: Vec<Option<TestCaseDraft>>,
    /// Extra cases beyond the input count, discarded
    pub surplus: usize,
}

impl AlignedCases {
    pub fn missing(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }
}

pub fn aligned_test_cases(value: &Value, expected: usize) -> AlignedCases {
    let items = list(value, "test_cases");
    let surplus = items.len().saturating_sub(expected);
    let slots = (0..expected)
        .map(|i| items.get(i).and_then(test_case))
        .collect();
    AlignedCases { slots, surplus }
}

/// Items of `{"optimized_cases": [...]}` that carry an id and a title.
pub fn optimized_cases(value: &Value) -> Vec<TestCaseContent> {
    list(value, "optimized_cases")
        .iter()
        .filter_map(|item| {
            let id = id_of(item.get("id"))?;
            let title = text(item.get("title"));
            if title.trim().is_empty() {
                return None;
            }
            Some(TestCaseContent {
                id,
                title,
                description: text(item.get("description")),
                preconditions: text(item.get("preconditions")),
                test_steps: steps(item.get("test_steps")),
                expected_result: text(item.get("expected_result")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_joins_lists() {
        assert_eq!(text(Some(&json!(["a", "b", 3]))), "a\nb\n3");
        assert_eq!(text(Some(&json!(null))), "");
        assert_eq!(text(None), "");
        assert_eq!(text(Some(&json!("plain"))), "plain");
    }

    #[test]
    fn test_out_of_range_step_numbers_use_position() {
        let raw = json!([
            {"step": -1, "action": "open page"},
            {"step": 4294967297u64, "action": "fill form"},
            {"step": 0, "action": "submit"},
            {"step": "7", "action": "log out"}
        ]);
        let numbers: Vec<u32> = steps(Some(&raw)).iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3, 7]);
    }

    #[test]
    fn test_steps_aliases() {
        let raw = json!([
            {"step": 1, "action": "open page", "expected": "page shown"},
            {"操作": "click login", "预期结果": "form shown"},
            {"action": "submit", "expected_result": "welcome"},
            "log out",
            42
        ]);
        let parsed = steps(Some(&raw));
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[1].step, 2);
        assert_eq!(parsed[1].action, "click login");
        assert_eq!(parsed[1].expected, "form shown");
        assert_eq!(parsed[2].expected, "welcome");
        assert_eq!(
            parsed[3],
            TestStep {
                step: 4,
                action: "log out".to_string(),
                expected: String::new()
            }
        );
    }

    #[test]
    fn test_requirement_points_skip_empty() {
        let value = json!({"requirement_points": [
            {"content": "User can log in", "priority": "P0", "module": "auth"},
            {"content": "  "},
            "Plain string point"
        ]});
        let points = requirement_points(&value);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].priority, Priority::High);
        assert_eq!(points[0].module.as_deref(), Some("auth"));
        assert_eq!(points[1].content, "Plain string point");
        assert_eq!(points[1].order_index, 2);
    }

    #[test]
    fn test_test_points_link_source() {
        let value = json!({"test_points": [
            {"content": "valid login", "design_method": "equivalence_class", "priority": "高"},
            {"content": "empty password"}
        ]});
        let points = test_points(&value, Some(11));
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.requirement_point_id == Some(11)));
        assert_eq!(points[0].priority, Priority::High);
        assert_eq!(points[1].test_type, "functional");
        assert_eq!(points[1].design_method, None);
    }

    #[test]
    fn test_alignment_pads_and_truncates() {
        let short = json!({"test_cases": [{"title": "A"}, {}]});
        let aligned = aligned_test_cases(&short, 3);
        assert_eq!(aligned.slots.len(), 3);
        assert!(aligned.slots[0].is_some());
        assert_eq!(aligned.missing(), 2);
        assert_eq!(aligned.surplus, 0);

        let long = json!({"test_cases": [{"title": "A"}, {"title": "B"}, {"title": "C"}]});
        let aligned = aligned_test_cases(&long, 2);
        assert_eq!(aligned.slots.len(), 2);
        assert_eq!(aligned.surplus, 1);
        assert_eq!(aligned.missing(), 0);
    }

    #[test]
    fn test_optimized_cases_accept_string_ids() {
        let value = json!({"optimized_cases": [
            {"id": "7", "title": "Better", "preconditions": ["logged out", "fresh browser"]},
            {"title": "no id"},
            {"id": 8, "title": ""}
        ]});
        let cases = optimized_cases(&value);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].id, 7);
        assert_eq!(cases[0].preconditions, "logged out\nfresh browser");
    }

    #[test]
    fn test_batch_points_linked_by_index() {
        let raw = json!({"test_points": [
            {"content": "a", "requirement_index": 2},
            {"content": "b", "requirement_index": "1"},
            {"content": "c", "requirement_index": 9},
            {"content": "d"}
        ]});
        let drafts = test_points_for_batch(&raw, &[Some(10), Some(20)]);
        let ids: Vec<_> = drafts.iter().map(|d| d.requirement_point_id).collect();
        assert_eq!(ids, vec![Some(20), Some(10), Some(10), Some(10)]);

        let single = test_points_for_batch(&raw, &[Some(7)]);
        assert!(single.iter().all(|d| d.requirement_point_id == Some(7)));
    }
}
