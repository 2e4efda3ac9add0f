//! Configuration resolution for omx-vision
//!
//! Resolution priority for the config file: explicit path argument →
//! `OMX_CONFIG` environment variable → `~/.config/omx-vision/config.toml`.
//! Secrets can additionally be overridden from the environment
//! (`OMX_TRAINING_KEY`, `OMX_CMS_TOKEN`); a warning is logged when a value
//! is present in both sources.

use crate::error::{Result, TrainError};
use crate::services::coordinator::PollPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const ENV_CONFIG_PATH: &str = "OMX_CONFIG";
const ENV_TRAINING_KEY: &str = "OMX_TRAINING_KEY";
const ENV_CMS_TOKEN: &str = "OMX_CMS_TOKEN";

const TRAINING_PATH_PREFIX: &str = "customvision/v3.0/training/projects";

fn default_publish_name() -> String {
    "production".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_bind_address() -> String {
    "127.0.0.1:5741".to_string()
}

/// Static configuration for one training project
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainerConfig {
    /// Training service base URL, with region
    pub endpoint: String,
    /// Custom Vision project id
    pub project_id: String,
    /// Static key sent as `Training-Key` on every request
    pub training_key: String,
    /// Prediction resource bound at publish time
    pub prediction_resource_id: String,
    /// The single production publish name
    #[serde(default = "default_publish_name")]
    pub publish_name: String,
    /// Host CMS API base for file lookup
    pub cms_base_url: String,
    /// Optional bearer token for file lookup
    #[serde(default)]
    pub cms_token: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl TrainerConfig {
    /// Load configuration following the path resolution priority order.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(explicit_path)?;
        info!("Loading configuration from {}", path.display());
        Self::from_file(&path)
    }

    /// Load and validate configuration from a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrainError::Config(format!("read {} failed: {}", path.display(), e)))?;
        let mut config: TrainerConfig = toml::from_str(&content)
            .map_err(|e| TrainError::Config(format!("parse {} failed: {}", path.display(), e)))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-variable overrides for secrets.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(ENV_TRAINING_KEY) {
            if !key.trim().is_empty() {
                if !self.training_key.trim().is_empty() {
                    warn!(
                        "Training key found in both config file and {}. Using environment.",
                        ENV_TRAINING_KEY
                    );
                }
                self.training_key = key;
            }
        }

        if let Ok(token) = std::env::var(ENV_CMS_TOKEN) {
            if !token.trim().is_empty() {
                self.cms_token = Some(token);
            }
        }
    }

    /// Reject configurations that cannot possibly authenticate or poll.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(TrainError::Config("endpoint must not be empty".into()));
        }
        if self.project_id.trim().is_empty() {
            return Err(TrainError::Config("project_id must not be empty".into()));
        }
        if self.training_key.trim().is_empty() {
            return Err(TrainError::Config(format!(
                "training_key must not be empty (set it in the config file or {})",
                ENV_TRAINING_KEY
            )));
        }
        if self.prediction_resource_id.trim().is_empty() {
            return Err(TrainError::Config(
                "prediction_resource_id must not be empty".into(),
            ));
        }
        if self.cms_base_url.trim().is_empty() {
            return Err(TrainError::Config("cms_base_url must not be empty".into()));
        }
        if self.poll_max_attempts == 0 {
            return Err(TrainError::Config(
                "poll_max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Versioned training API root for the configured project.
    pub fn training_endpoint(&self) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            TRAINING_PATH_PREFIX,
            self.project_id
        )
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.poll_max_attempts,
        }
    }
}

/// Resolve the config file path: argument → ENV → platform default.
fn resolve_config_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Ok(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|dir| dir.join("omx-vision").join("config.toml"))
        .ok_or_else(|| {
            TrainError::Config(format!(
                "no config directory on this platform; pass a path or set {}",
                ENV_CONFIG_PATH
            ))
        })
}
