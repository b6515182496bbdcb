//! Orchestrator configuration
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CONFIG/IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("CONFIG/YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Contract holding the reports; sessions fall back to the ledger's own address
    pub contract_address: Option<String>,

    // === Status display ===
    pub success_display_ms: u64,
    pub error_display_ms: u64,
    pub cancel_display_ms: u64,

    // === History ===
    /// How many entries the UI shows
    pub history_view: usize,
    /// How many entries are retained
    pub history_capacity: usize,

    /// Prefix of locally generated report ids
    pub id_prefix: String,
}

impl OrchestratorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn success_display(&self) -> Duration {
        Duration::from_millis(self.success_display_ms)
    }

    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.error_display_ms)
    }

    pub fn cancel_display(&self) -> Duration {
        Duration::from_millis(self.cancel_display_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            contract_address: None,
            success_display_ms: 2_000,
            error_display_ms: 3_000,
            cancel_display_ms: 3_000,
            history_view: 5,
            history_capacity: 10_000,
            id_prefix: "report".to_string(),
        }
    }
}
