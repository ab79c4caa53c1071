//! System settings repository

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::models::{SystemConfig, TestCategory, TestDesignMethod};
use crate::tasks::ConcurrencyConfig;
use chrono::Utc;

/// `system_configs` key of the concurrency settings.
pub const CONCURRENCY_KEY: &str = "concurrency_config";

pub struct SettingsRepository;

impl SettingsRepository {
    pub async fn get(pool: &DatabasePool, key: &str) -> DbResult<Option<SystemConfig>> {
        let row = sqlx::query_as::<_, SystemConfig>(
            "SELECT id, config_key, config_value, description, updated_at \
             FROM system_configs WHERE config_key = ?",
        )
        .bind(key)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    /// Insert or replace the value under `key`.
    pub async fn set(
        pool: &DatabasePool,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> DbResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO system_configs (config_key, config_value, description, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(config_key) DO UPDATE SET \
             config_value = excluded.config_value, \
             description = COALESCE(excluded.description, system_configs.description), \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert only when the key is absent. Returns true if a row was written.
    pub async fn set_if_missing(
        pool: &DatabasePool,
        key: &str,
        value: &str,
        description: Option<&str>,
    ) -> DbResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO system_configs \
             (config_key, config_value, description, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stored concurrency settings, if present and parseable.
    pub async fn load_concurrency(pool: &DatabasePool) -> DbResult<Option<ConcurrencyConfig>> {
        let Some(row) = Self::get(pool, CONCURRENCY_KEY).await? else {
            return Ok(None);
        };
        let config = serde_json::from_str(&row.config_value)?;
        Ok(Some(config))
    }

    pub async fn save_concurrency(pool: &DatabasePool, config: &ConcurrencyConfig) -> DbResult<()> {
        let value = serde_json::to_string(config)?;
        Self::set(pool, CONCURRENCY_KEY, &value, Some("Task concurrency settings")).await
    }

    pub async fn list_categories(
        pool: &DatabasePool,
        active_only: bool,
    ) -> DbResult<Vec<TestCategory>> {
        let sql = if active_only {
            "SELECT id, code, name, description, is_active, sort_order FROM test_categories \
             WHERE is_active = 1 ORDER BY sort_order ASC, id ASC"
        } else {
            "SELECT id, code, name, description, is_active, sort_order FROM test_categories \
             ORDER BY sort_order ASC, id ASC"
        };
        let rows = sqlx::query_as::<_, TestCategory>(sql).fetch_all(pool).await?;
        Ok(rows)
    }

    pub async fn list_design_methods(
        pool: &DatabasePool,
        active_only: bool,
    ) -> DbResult<Vec<TestDesignMethod>> {
        let sql = if active_only {
            "SELECT id, code, name, description, is_active, sort_order FROM test_design_methods \
             WHERE is_active = 1 ORDER BY sort_order ASC, id ASC"
        } else {
            "SELECT id, code, name, description, is_active, sort_order FROM test_design_methods \
             ORDER BY sort_order ASC, id ASC"
        };
        let rows = sqlx::query_as::<_, TestDesignMethod>(sql).fetch_all(pool).await?;
        Ok(rows)
    }

    pub async fn insert_category_if_missing(
        pool: &DatabasePool,
        code: &str,
        name: &str,
        is_active: bool,
        sort_order: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO test_categories (code, name, is_active, sort_order) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(code)
        .bind(name)
        .bind(is_active)
        .bind(sort_order)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_design_method_if_missing(
        pool: &DatabasePool,
        code: &str,
        name: &str,
        sort_order: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO test_design_methods (code, name, is_active, sort_order) \
             VALUES (?, ?, 1, ?)",
        )
        .bind(code)
        .bind(name)
        .bind(sort_order)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated;

    #[tokio::test]
    async fn test_concurrency_round_trip() {
        let db = migrated().await;
        assert!(SettingsRepository::load_concurrency(db.pool()).await.unwrap().is_none());

        let config = ConcurrencyConfig {
            max_concurrent_tasks: 5,
            ..Default::default()
        };
        SettingsRepository::save_concurrency(db.pool(), &config).await.unwrap();
        SettingsRepository::save_concurrency(db.pool(), &config).await.unwrap();

        let loaded = SettingsRepository::load_concurrency(db.pool()).await.unwrap();
        assert_eq!(loaded, Some(config));
    }

    #[tokio::test]
    async fn test_set_if_missing_keeps_existing() {
        let db = migrated().await;
        assert!(SettingsRepository::set_if_missing(db.pool(), "k", "1", None).await.unwrap());
        assert!(!SettingsRepository::set_if_missing(db.pool(), "k", "2", None).await.unwrap());
        let row = SettingsRepository::get(db.pool(), "k").await.unwrap().unwrap();
        assert_eq!(row.config_value, "1");
    }

    #[tokio::test]
    async fn test_active_only_filter() {
        let db = migrated().await;
        let pool = db.pool();
        SettingsRepository::insert_category_if_missing(pool, "functional", "Functional", true, 1)
            .await
            .unwrap();
        SettingsRepository::insert_category_if_missing(db.pool(), "stress", "Stress", false, 2)
            .await
            .unwrap();

        let all = SettingsRepository::list_categories(db.pool(), false).await.unwrap();
        let active = SettingsRepository::list_categories(db.pool(), true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "functional");
    }
}
