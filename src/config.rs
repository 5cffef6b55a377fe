//! Application Configuration
//!
//! Loaded from a YAML file. Every field is optional; anything left out
//! falls back to its default.
//!
//! ```yaml
//! model: gpt-4o
//! api_base: https://api.openai.com/v1
//! api_key_env: OPENAI_API_KEY
//! request_timeout_secs: 120
//! python: /usr/bin/python3
//! script_timeout_secs: 600
//! max_repair_attempts: 5
//! max_approval_rounds: 10
//! state_dir: .demoforge
//! database: DEMO_DB
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::graph::LoopLimits;

/// Looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "demoforge.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read { path: String, source: io::Error },

    #[error("failed to parse config file '{path}': {source}")]
    Parse { path: String, source: serde_yaml::Error },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Chat model name
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    pub api_base: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    pub request_timeout_secs: u64,

    /// Interpreter for dataset scripts. Discovered when unset.
    pub python: Option<PathBuf>,

    pub script_timeout_secs: u64,

    /// Repair bound. `null` disables it.
    pub max_repair_attempts: Option<u32>,

    /// Approval bound. `null` disables it.
    pub max_approval_rounds: Option<u32>,

    /// Root of checkpoints, session workspaces and the local warehouse
    pub state_dir: PathBuf,

    /// Database name used in fully qualified warehouse names
    pub database: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
            python: None,
            script_timeout_secs: 600,
            max_repair_attempts: Some(LoopLimits::DEFAULT_MAX_REPAIR_ATTEMPTS),
            max_approval_rounds: Some(LoopLimits::DEFAULT_MAX_APPROVAL_ROUNDS),
            state_dir: PathBuf::from(".demoforge"),
            database: "DEMO_DB".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, else `demoforge.yaml` if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".to_string()));
        }
        if self.script_timeout_secs == 0 {
            return Err(ConfigError::Invalid("script_timeout_secs must be positive".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database must not be empty".to_string()));
        }
        Ok(())
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn limits(&self) -> LoopLimits {
        LoopLimits {
            max_repair_attempts: self.max_repair_attempts,
            max_approval_rounds: self.max_approval_rounds,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.state_dir.join("checkpoints")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("sessions")
    }

    pub fn warehouse_dir(&self) -> PathBuf {
        self.state_dir.join("warehouse")
    }
}
