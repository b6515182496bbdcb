//! Server configuration from the environment
use std::path::PathBuf;
use whistle_core::{ConfigError, OrchestratorConfig};

pub const ADDR_ENV: &str = "WHISTLE_ADDR";
pub const CONFIG_ENV: &str = "WHISTLE_CONFIG";
pub const LOG_ENV: &str = "WHISTLE_LOG";
pub const LOG_JSON_ENV: &str = "WHISTLE_LOG_JSON";

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub addr: String,
    /// Optional YAML file with orchestrator settings
    pub config_path: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            config_path: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            addr: lookup(ADDR_ENV).unwrap_or(defaults.addr),
            config_path: lookup(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from),
            log_level: lookup(LOG_ENV).unwrap_or(defaults.log_level),
            log_json: lookup(LOG_JSON_ENV)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.log_json),
        }
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ConfigError> {
        match &self.config_path {
            Some(path) => OrchestratorConfig::from_path(path),
            None => Ok(OrchestratorConfig::default()),
        }
    }
}
