//! TestFlow generation backend
//!
//! Turns requirement text into requirement points, test points and test
//! cases through four LLM-backed stages. Every generation request becomes a
//! background task:
//!
//! - [`tasks`] tracks tasks in memory and admits at most `max_concurrent`
//!   at a time, queueing the rest in FIFO order
//! - [`executor`] runs batched LLM calls with retries and JSON extraction
//! - [`pipeline`] holds the stage logic and the one-click orchestration
//! - [`api`] exposes launches, polling and cancellation over HTTP

pub mod api;
pub mod config;
pub mod db;
pub mod executor;
pub mod pipeline;
pub mod services;
pub mod tasks;
pub mod version;

pub use tasks::{
    AdmissionGate, ConcurrencyConfig, TaskError, TaskRegistry, TaskRunner, TaskStatus, TaskType,
};
