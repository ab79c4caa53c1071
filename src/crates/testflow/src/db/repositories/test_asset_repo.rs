//! Test point and test case repositories

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{TestCase, TestPoint};
use crate::pipeline::model::{TestCaseContent, TestCaseDraft, TestPointDraft};
use chrono::Utc;
use sqlx::types::Json;

const POINT_COLUMNS: &str = "id, requirement_point_id, module_id, content, test_type, \
                             design_method, priority, created_by_ai, created_at";

const CASE_COLUMNS: &str = "id, test_point_id, module_id, title, description, preconditions, \
                            test_steps, expected_result, design_method, test_category, priority, \
                            created_by_ai, created_at, updated_at";

pub struct TestPointRepository;

impl TestPointRepository {
    /// Store generated test points, in one transaction.
    pub async fn insert_many(
        pool: &DatabasePool,
        module_id: Option<i64>,
        drafts: &[TestPointDraft],
    ) -> DbResult<Vec<TestPoint>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;
        let mut stored = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let row = sqlx::query_as::<_, TestPoint>(&format!(
                "INSERT INTO test_points (requirement_point_id, module_id, content, test_type, \
                 design_method, priority, created_by_ai, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, 1, ?) RETURNING {}",
                POINT_COLUMNS
            ))
            .bind(draft.requirement_point_id)
            .bind(module_id)
            .bind(&draft.content)
            .bind(&draft.test_type)
            .bind(&draft.design_method)
            .bind(draft.priority.as_str())
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn list_by_module(pool: &DatabasePool, module_id: i64) -> DbResult<Vec<TestPoint>> {
        let rows = sqlx::query_as::<_, TestPoint>(&format!(
            "SELECT {} FROM test_points WHERE module_id = ? ORDER BY id ASC",
            POINT_COLUMNS
        ))
        .bind(module_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Remove the test points generated from these requirement points.
    pub async fn delete_by_requirement_points(
        pool: &DatabasePool,
        requirement_point_ids: &[i64],
    ) -> DbResult<u64> {
        let mut deleted = 0;
        for id in requirement_point_ids {
            deleted += sqlx::query("DELETE FROM test_points WHERE requirement_point_id = ?")
                .bind(id)
                .execute(pool)
                .await?
                .rows_affected();
        }
        Ok(deleted)
    }
}

pub struct TestCaseRepository;

impl TestCaseRepository {
    /// Store one designed batch, in one transaction.
    pub async fn insert_many(
        pool: &DatabasePool,
        module_id: Option<i64>,
        drafts: &[TestCaseDraft],
    ) -> DbResult<Vec<TestCase>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;
        let mut stored = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let row = sqlx::query_as::<_, TestCase>(&format!(
                "INSERT INTO test_cases (test_point_id, module_id, title, description, \
                 preconditions, test_steps, expected_result, design_method, test_category, \
                 priority, created_by_ai, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?) RETURNING {}",
                CASE_COLUMNS
            ))
            .bind(draft.test_point_id)
            .bind(module_id)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.preconditions)
            .bind(Json(&draft.test_steps))
            .bind(&draft.expected_result)
            .bind(&draft.design_method)
            .bind(&draft.test_type)
            .bind(draft.priority.as_str())
            .bind(&now)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn get(pool: &DatabasePool, id: i64) -> DbResult<Option<TestCase>> {
        let row = sqlx::query_as::<_, TestCase>(&format!(
            "SELECT {} FROM test_cases WHERE id = ?",
            CASE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn list_by_module(pool: &DatabasePool, module_id: i64) -> DbResult<Vec<TestCase>> {
        let rows = sqlx::query_as::<_, TestCase>(&format!(
            "SELECT {} FROM test_cases WHERE module_id = ? ORDER BY id ASC",
            CASE_COLUMNS
        ))
        .bind(module_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Overwrite the editable body of a stored case. Returns false if it is gone.
    pub async fn apply_content(pool: &DatabasePool, content: &TestCaseContent) -> DbResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE test_cases SET title = ?, description = ?, preconditions = ?, test_steps = ?, \
             expected_result = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&content.title)
        .bind(&content.description)
        .bind(&content.preconditions)
        .bind(Json(&content.test_steps))
        .bind(&content.expected_result)
        .bind(&now)
        .bind(content.id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_by_module(pool: &DatabasePool, module_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM test_cases WHERE module_id = ?")
            .bind(module_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewRequirementFile;
    use crate::db::repositories::RequirementRepository;
    use crate::db::test_support::migrated;
    use crate::pipeline::model::{Priority, RequirementPointDraft, TestStep};

    fn case(test_point_id: Option<i64>, title: &str) -> TestCaseDraft {
        TestCaseDraft {
            test_point_id,
            title: title.into(),
            description: "d".into(),
            preconditions: "p".into(),
            test_steps: vec![TestStep {
                step: 1,
                action: "open".into(),
                expected: "opened".into(),
            }],
            expected_result: "ok".into(),
            design_method: Some("boundary_value".into()),
            test_type: "functional".into(),
            priority: Priority::Low,
        }
    }

    #[tokio::test]
    async fn test_cascade_from_requirement_points() {
        let db = migrated().await;
        let file = RequirementRepository::create_file(
            db.pool(),
            &NewRequirementFile {
                filename: "r.md".into(),
                module_id: Some(1),
                extracted_content: "text".into(),
            },
        )
        .await
        .unwrap();
        let rps = RequirementRepository::insert_points(
            db.pool(),
            file.id,
            Some(1),
            &[RequirementPointDraft {
                content: "rp".into(),
                module: None,
                priority: Priority::Medium,
                order_index: 0,
            }],
        )
        .await
        .unwrap();
        let tps = TestPointRepository::insert_many(
            db.pool(),
            Some(1),
            &[TestPointDraft {
                requirement_point_id: Some(rps[0].id),
                content: "tp".into(),
                test_type: "functional".into(),
                design_method: None,
                priority: Priority::Medium,
            }],
        )
        .await
        .unwrap();
        TestCaseRepository::insert_many(db.pool(), Some(1), &[case(Some(tps[0].id), "tc")])
            .await
            .unwrap();
        assert_eq!(TestCaseRepository::list_by_module(db.pool(), 1).await.unwrap().len(), 1);

        RequirementRepository::delete_points_by_file(db.pool(), file.id).await.unwrap();
        assert!(TestPointRepository::list_by_module(db.pool(), 1).await.unwrap().is_empty());
        assert!(TestCaseRepository::list_by_module(db.pool(), 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_steps_stored_as_json_and_content_applied() {
        let db = migrated().await;
        let stored = TestCaseRepository::insert_many(db.pool(), Some(2), &[case(None, "before")])
            .await
            .unwrap();
        assert_eq!(stored[0].test_steps.0[0].action, "open");

        let mut content = stored[0].to_content();
        content.title = "after".into();
        content.test_steps.push(TestStep {
            step: 2,
            action: "close".into(),
            expected: "closed".into(),
        });
        assert!(TestCaseRepository::apply_content(db.pool(), &content).await.unwrap());

        let reloaded = TestCaseRepository::get(db.pool(), stored[0].id).await.unwrap().unwrap();
        assert_eq!(reloaded.title, "after");
        assert_eq!(reloaded.test_steps.0.len(), 2);
        assert_eq!(reloaded.priority, "low");

        content.id = 9999;
        assert!(!TestCaseRepository::apply_content(db.pool(), &content).await.unwrap());
    }
}
