//! Configuration loading.
//!
//! Settings come from an optional config file (TOML, YAML or JSON, chosen by
//! extension) and are then overridden by environment variables. A `.env`
//! file is loaded by the binary before any of this runs.

mod chat;
mod database;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;

pub use chat::ChatConfig;
pub use database::{DatabaseConfig, ServerAddress, DEFAULT_ODBC_DRIVER};

/// Config file looked up in the user config directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILENAME: &str = "config.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("SQL_DATABASE must be set")]
    MissingDatabase,
    #[error("Invalid server '{server}': {reason}")]
    InvalidServer { server: String, reason: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    /// File this config was loaded from, if any
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, the default config file, or defaults,
    /// then apply environment overrides.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_from_path(&expand_path(path)).await?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    tracing::debug!("Using config file: {}", path.display());
                    Self::load_from_path(&path).await?
                }
                None => Self::default(),
            },
        };
        Ok(config.with_env_overrides())
    }

    /// Parse a config file without applying environment overrides.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config: Config = match ext {
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            "json" => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            _ => toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from<F>(self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            database: self.database.with_overrides_from(&var),
            llm: self.llm.with_overrides_from(&var),
            chat: self.chat.with_overrides_from(&var),
            source_path: self.source_path,
        }
    }

    /// Check settings needed before connecting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.database_name().is_none() {
            return Err(ConfigError::MissingDatabase);
        }
        self.database.server_address()?;
        Ok(())
    }
}

/// `~/.config/sqlchat/config.toml` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlchat").join(DEFAULT_CONFIG_FILENAME))
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

/// Parse common boolean spellings used in environment variables.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
