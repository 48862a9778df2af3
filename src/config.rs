use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding `database.url`
pub const ENV_DATABASE_URI: &str = "DATABASE_URI";
/// Environment variable overriding `accrual.base_address`
pub const ENV_ACCRUAL_ADDRESS: &str = "ACCRUAL_SYSTEM_ADDRESS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub database: DatabaseConfig,
    pub accrual: AccrualConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccrualConfig {
    pub base_address: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_retry_after_secs() -> u64 {
    60
}

/// Accrual pipeline tunables.
///
/// `queue_capacity` also bounds the in-flight set: discovery never claims
/// more orders than the work queue can hold. A longer
/// `discovery_interval_ms` delays orders that did not fit into the queue on
/// the previous scan.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub workers: usize,
    pub discovery_interval_ms: u64,
    /// Upper bound on a requester pause asked for through `Retry-After`
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            result_queue_capacity: 100,
            workers: 4,
            discovery_interval_ms: 100,
            max_retry_after_secs: default_max_retry_after_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("pipeline.queue_capacity must be > 0".into()));
        }
        if self.result_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.result_queue_capacity must be > 0".into(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("pipeline.workers must be > 0".into()));
        }
        if self.discovery_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.discovery_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`, apply environment overrides and validate
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Override connection settings from the environment.
    ///
    /// `lookup` is injected so tests do not touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URI).filter(|v| !v.is_empty()) {
            self.database.url = url;
        }
        if let Some(address) = lookup(ENV_ACCRUAL_ADDRESS).filter(|v| !v.is_empty()) {
            self.accrual.base_address = address;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accrual.base_address.trim().is_empty() {
            return Err(ConfigError::Invalid("accrual.base_address is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be > 0".into()));
        }
        self.pipeline.validate()
    }
}
