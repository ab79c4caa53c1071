//! Application services

pub mod generation;

pub use generation::{GenerationError, GenerationService};
