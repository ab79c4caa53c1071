//! HTTP request handlers

pub mod ai_config;
pub mod generation;
pub mod health;
pub mod requirements;
pub mod settings;
pub mod tasks;
