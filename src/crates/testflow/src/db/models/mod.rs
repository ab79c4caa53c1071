//! Database models
//!
//! Row types for persistent storage. Timestamps are stored as RFC 3339
//! strings (TEXT in SQLite).

pub mod ai_config;
pub mod requirement;
pub mod settings;
pub mod task_log;
pub mod test_asset;

pub use ai_config::{Agent, AiModel, NewAgent, NewAiModel};
pub use requirement::{NewRequirementFile, RequirementFile, RequirementPoint};
pub use settings::{SystemConfig, TestCategory, TestDesignMethod};
pub use task_log::{NewTaskLog, TaskLog};
pub use test_asset::{TestCase, TestPoint};
