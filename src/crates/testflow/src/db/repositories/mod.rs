//! Repository implementations for database access
//!
//! Each repository is a unit struct of static async functions taking the pool.

pub mod ai_config_repo;
pub mod requirement_repo;
pub mod settings_repo;
pub mod task_log_repo;
pub mod test_asset_repo;

pub use ai_config_repo::{AgentRepository, AiModelRepository};
pub use requirement_repo::RequirementRepository;
pub use settings_repo::{SettingsRepository, CONCURRENCY_KEY};
pub use task_log_repo::TaskLogRepository;
pub use test_asset_repo::{TestCaseRepository, TestPointRepository};
