//! Database module
//!
//! SQLite connectivity, row models, repositories and default seed data.

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;
pub mod seed;

pub use connection::{DatabaseConnection, DatabasePool, PoolStatistics};
pub use error::{DatabaseError, DbResult};
pub use seed::{seed_defaults, SeedReport};
