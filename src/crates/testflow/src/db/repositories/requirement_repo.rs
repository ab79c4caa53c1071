//! Requirement file and requirement point repository

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{NewRequirementFile, RequirementFile, RequirementPoint};
use crate::pipeline::model::RequirementPointDraft;
use chrono::Utc;

const POINT_COLUMNS: &str = "id, requirement_file_id, module_id, content, module_name, priority, \
                             source, order_index, created_at";

pub struct RequirementRepository;

impl RequirementRepository {
    pub async fn create_file(
        pool: &DatabasePool,
        file: &NewRequirementFile,
    ) -> DbResult<RequirementFile> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query_as::<_, RequirementFile>(
            "INSERT INTO requirement_files (filename, module_id, extracted_content, created_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, filename, module_id, extracted_content, created_at",
        )
        .bind(&file.filename)
        .bind(file.module_id)
        .bind(&file.extracted_content)
        .bind(&now)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn get_file(pool: &DatabasePool, id: i64) -> DbResult<Option<RequirementFile>> {
        let row = sqlx::query_as::<_, RequirementFile>(
            "SELECT id, filename, module_id, extracted_content, created_at \
             FROM requirement_files WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Concatenated text of every document in a module, used as design context.
    pub async fn module_context(pool: &DatabasePool, module_id: i64) -> DbResult<String> {
        let files = sqlx::query_as::<_, RequirementFile>(
            "SELECT id, filename, module_id, extracted_content, created_at \
             FROM requirement_files WHERE module_id = ? ORDER BY id ASC",
        )
        .bind(module_id)
        .fetch_all(pool)
        .await?;

        Ok(files
            .iter()
            .filter(|f| !f.extracted_content.trim().is_empty())
            .map(|f| format!("[Requirement document: {}]\n{}", f.filename, f.extracted_content))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"))
    }

    pub async fn list_points_by_file(
        pool: &DatabasePool,
        file_id: i64,
    ) -> DbResult<Vec<RequirementPoint>> {
        let rows = sqlx::query_as::<_, RequirementPoint>(&format!(
            "SELECT {} FROM requirement_points WHERE requirement_file_id = ? \
             ORDER BY order_index ASC, id ASC",
            POINT_COLUMNS
        ))
        .bind(file_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Delete a file's points. Their test points and test cases cascade.
    pub async fn delete_points_by_file(pool: &DatabasePool, file_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM requirement_points WHERE requirement_file_id = ?")
            .bind(file_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Store analysis output for a file, in one transaction.
    pub async fn insert_points(
        pool: &DatabasePool,
        file_id: i64,
        module_id: Option<i64>,
        drafts: &[RequirementPointDraft],
    ) -> DbResult<Vec<RequirementPoint>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = pool.begin().await?;
        let mut stored = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let row = sqlx::query_as::<_, RequirementPoint>(&format!(
                "INSERT INTO requirement_points (requirement_file_id, module_id, content, \
                 module_name, priority, source, order_index, created_at) \
                 VALUES (?, ?, ?, ?, ?, 'ai_generated', ?, ?) RETURNING {}",
                POINT_COLUMNS
            ))
            .bind(file_id)
            .bind(module_id)
            .bind(&draft.content)
            .bind(&draft.module)
            .bind(draft.priority.as_str())
            .bind(draft.order_index)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;
        Ok(stored)
    }
}
