//! Office configuration

use crate::model::DEFAULT_DURATION_MINUTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the JSON snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Length given to consultations booked without an explicit duration
    #[serde(default = "default_duration")]
    pub default_duration_minutes: u32,
}

/// Administrator account allowed to manage staff
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin")]
    pub login: String,
    #[serde(default = "default_admin")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Defaults
fn default_data_dir() -> PathBuf { PathBuf::from("data") }
fn default_duration() -> u32 { DEFAULT_DURATION_MINUTES }
fn default_admin() -> String { "admin".to_string() }
fn default_filter() -> String { "clinic_core=info".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir() }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self { default_duration_minutes: default_duration() }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            login: default_admin(),
            password: default_admin(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ClinicConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ClinicConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduling.default_duration_minutes == 0 {
            return Err(ConfigError::Invalid(
                "scheduling.default_duration_minutes must be positive".to_string(),
            ));
        }
        if self.admin.login.trim().is_empty() {
            return Err(ConfigError::Invalid("admin.login must not be empty".to_string()));
        }
        Ok(())
    }
}
