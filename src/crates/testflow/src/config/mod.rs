//! Configuration module
//!
//! Server configuration loading (TOML plus environment overrides) and the
//! bearer-key security middleware.

pub mod security;
pub mod server;

pub use security::{security_middleware, SecurityState};
pub use server::{
    DatabaseConfig, ListenConfig, SecurityConfig, SecurityMode, ServerConfig, ServerConfigError,
};
