//! Server configuration for testflow-server
//!
//! Loaded from TOML, then overridden from the environment. Every section is
//! optional and falls back to built-in defaults.

use crate::pipeline::PipelineSettings;
use crate::tasks::ConcurrencyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Listen address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://testflow.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Security mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// No authentication required
    #[default]
    Open,
    /// Bearer secret key on every API route
    #[serde(alias = "secret-key")]
    SecretKey,
}

/// Security configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub mode: SecurityMode,
    /// Overridden by the SECRET_KEY environment variable
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Complete server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ListenConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Seed for the stored concurrency settings
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServerConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ServerConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Load configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ServerConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from the default locations and the environment
    ///
    /// Searches for config in:
    /// 1. CONFIG_PATH environment variable
    /// 2. ./config/server.toml
    /// 3. ./server.toml
    ///
    /// Built-in defaults are used when no file exists.
    pub fn load() -> Result<Self, ServerConfigError> {
        let mut config = match std::env::var("CONFIG_PATH") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => {
                let found = ["config/server.toml", "server.toml"]
                    .iter()
                    .map(PathBuf::from)
                    .find(|path| path.exists());
                match found {
                    Some(path) => Self::from_file(path)?,
                    None => Self::default(),
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply HOST, PORT, DATABASE_URL, SECRET_KEY and FAILED_RESPONSE_DIR.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = lookup("SECRET_KEY") {
            self.security.secret_key = Some(key);
        }
        if let Some(dir) = lookup("FAILED_RESPONSE_DIR") {
            self.pipeline.failed_response_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ServerConfigError> {
        self.concurrency.validate().map_err(ServerConfigError::InvalidConfig)?;

        if self.security.mode == SecurityMode::SecretKey
            && self.security.secret_key.as_deref().map(str::is_empty).unwrap_or(true)
        {
            return Err(ServerConfigError::InvalidConfig(
                "security mode secret_key requires a secret_key or SECRET_KEY".to_string(),
            ));
        }

        if self.pipeline.test_point_batch_size == 0
            || self.pipeline.test_case_batch_size == 0
            || self.pipeline.optimization_batch_size == 0
        {
            return Err(ServerConfigError::InvalidConfig(
                "batch sizes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
[server]
port = 9000

[database]
url = "sqlite://other.db"

[security]
mode = "secret_key"
secret_key = "s3cret"

[concurrency]
max_concurrent_tasks = 5

[pipeline]
test_case_batch_size = 4
job_deadline_secs = 1800
"#;

        let config = ServerConfig::from_str(toml_content).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.database.url, "sqlite://other.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.security.mode, SecurityMode::SecretKey);
        assert_eq!(config.concurrency.max_concurrent_tasks, 5);
        assert_eq!(config.concurrency.queue_size, 100);
        assert_eq!(config.pipeline.test_case_batch_size, 4);
        assert_eq!(config.pipeline.job_deadline_secs, Some(1800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = ServerConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.mode, SecurityMode::Open);
        assert_eq!(config.concurrency, ConcurrencyConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_kebab_case_mode_alias() {
        let config = ServerConfig::from_str("[security]\nmode = \"secret-key\"").unwrap();
        assert_eq!(config.security.mode, SecurityMode::SecretKey);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "7000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET_KEY", "from-env"),
            ("FAILED_RESPONSE_DIR", "/tmp/failed"),
        ]
        .into_iter()
        .collect();

        let mut config = ServerConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.security.secret_key.as_deref(), Some("from-env"));
        assert_eq!(config.pipeline.failed_response_dir, PathBuf::from("/tmp/failed"));
    }

    #[test]
    fn test_out_of_range_concurrency_rejected() {
        let config = ServerConfig::from_str("[concurrency]\nmax_concurrent_tasks = 50").unwrap();
        assert!(matches!(config.validate(), Err(ServerConfigError::InvalidConfig(_))));
    }
}
