use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_REENTRANT_PASSES: usize = 32;
pub const DEFAULT_FLOW_SEPARATOR: char = '_';

/// Tunables shared by the engine and the session dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Drain passes the session runs for notifications raised during its own work.
    pub max_reentrant_passes: usize,
    /// Separator between a flow field id and its variable name in dependency keys.
    pub flow_separator: char,
    pub log_level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reentrant_passes: DEFAULT_MAX_REENTRANT_PASSES,
            flow_separator: DEFAULT_FLOW_SEPARATOR,
            log_level: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_reentrant_passes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_reentrant_passes",
                reason: "must be at least 1".into(),
            });
        }
        if self.flow_separator.is_alphanumeric() || self.flow_separator.is_whitespace() {
            return Err(ConfigError::InvalidValue {
                key: "flow_separator",
                reason: format!("'{}' cannot separate identifiers", self.flow_separator),
            });
        }
        if let Some(level) = &self.log_level
            && !matches!(
                level.to_ascii_lowercase().as_str(),
                "error" | "warn" | "info" | "debug" | "trace" | "off"
            )
        {
            return Err(ConfigError::InvalidValue {
                key: "log_level",
                reason: format!("unknown level '{level}'"),
            });
        }
        Ok(())
    }

    pub fn with_max_passes(mut self, passes: usize) -> Self {
        self.max_reentrant_passes = passes;
        self
    }
}
