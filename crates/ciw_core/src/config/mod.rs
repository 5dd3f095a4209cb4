use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_file, AppError};
use crate::reconcile::ReconcilePolicy;

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_token_env() -> String {
    "CIW_TRACKER_TOKEN".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// API root, e.g. `https://api.github.com`.
    pub base_url: String,
    /// `owner/name`.
    pub repository: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Labels applied to created issues in addition to the service label.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssigneeConfig {
    /// service -> assignee
    #[serde(default)]
    pub by_service: BTreeMap<String, String>,
    #[serde(default)]
    pub default_assignee: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WatchConfig {
    pub service: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub assignees: AssigneeConfig,
    #[serde(default)]
    pub policy: ReconcilePolicy,
}

impl WatchConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let cfg: WatchConfig = serde_json::from_str(json).map_err(|e| {
            AppError::new("CONFIG_PARSE_FAILED", "Failed to parse watch config")
                .with_details(e.to_string())
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.service.trim().is_empty() {
            return Err(AppError::new("CONFIG_INVALID", "Service name is required"));
        }
        if self.tracker.repository.trim().is_empty() {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "Tracker repository is required",
            ));
        }
        if self.tracker.retry_max_attempts == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "retry_max_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<WatchConfig, AppError> {
    WatchConfig::from_json_str(&read_file(path)?).map_err(|e| {
        let details = match e.details {
            Some(d) => format!("path={}; {d}", path.display()),
            None => format!("path={}", path.display()),
        };
        AppError {
            details: Some(details),
            ..e
        }
    })
}
