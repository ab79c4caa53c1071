//! Default settings rows
//!
//! Seeding is idempotent: existing rows (including user edits) are never
//! overwritten.

use crate::db::connection::DatabasePool;
use crate::db::error::DbResult;
use crate::db::repositories::{SettingsRepository, CONCURRENCY_KEY};
use crate::tasks::ConcurrencyConfig;
use tracing::info;

/// (code, name, active by default)
const DEFAULT_CATEGORIES: &[(&str, &str, bool)] = &[
    ("functional", "Functional testing", true),
    ("performance", "Performance testing", true),
    ("security", "Security testing", true),
    ("interface", "Interface testing", true),
    ("stress", "Stress testing", true),
    ("usability", "Usability testing", true),
    ("compatibility", "Compatibility testing", false),
    ("installation", "Installation testing", false),
    ("configuration", "Configuration testing", false),
    ("exploratory", "Exploratory testing", false),
    ("automation", "Automation testing", false),
    ("disaster_recovery", "Disaster recovery testing", false),
    ("localization", "Localization testing", false),
    ("load", "Load testing", false),
    ("capacity", "Capacity testing", false),
];

const DEFAULT_DESIGN_METHODS: &[(&str, &str)] = &[
    ("equivalence_partitioning", "Equivalence partitioning"),
    ("boundary_value", "Boundary value analysis"),
    ("cause_effect", "Cause-effect graphing"),
    ("decision_table", "Decision table"),
    ("state_transition", "State transition"),
    ("orthogonal_array", "Orthogonal array"),
    ("scenario", "Scenario"),
    ("error_guessing", "Error guessing"),
];

/// Counts of rows written by one [`seed_defaults`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub design_methods: usize,
    pub concurrency: bool,
}

pub async fn seed_defaults(pool: &DatabasePool) -> DbResult<SeedReport> {
    let mut report = SeedReport::default();

    for (index, (code, name, active)) in DEFAULT_CATEGORIES.iter().enumerate() {
        let sort_order = index as i64;
        if SettingsRepository::insert_category_if_missing(pool, code, name, *active, sort_order)
            .await?
        {
            report.categories += 1;
        }
    }

    for (index, (code, name)) in DEFAULT_DESIGN_METHODS.iter().enumerate() {
        let sort_order = index as i64;
        if SettingsRepository::insert_design_method_if_missing(pool, code, name, sort_order)
            .await?
        {
            report.design_methods += 1;
        }
    }

    let concurrency = serde_json::to_string(&ConcurrencyConfig::default())?;
    report.concurrency = SettingsRepository::set_if_missing(
        pool,
        CONCURRENCY_KEY,
        &concurrency,
        Some("Task concurrency settings"),
    )
    .await?;

    if report != SeedReport::default() {
        info!(
            categories = report.categories,
            design_methods = report.design_methods,
            concurrency = report.concurrency,
            "Seeded default settings"
        );
    }

    Ok(report)
}
