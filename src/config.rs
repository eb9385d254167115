//! Service configuration.
//!
//! Loaded in two layers: an optional YAML file named by `HAMO_CONFIG`, then
//! environment variable overrides. Every field has a default except the
//! completion API key.
//!
//! # Environment Variables
//!
//! - `HAMO_CONFIG` - path to a YAML config file
//! - `PORT` - HTTP port (default: 8080)
//! - `HAMO_STORE` - storage backend: "memory" (default) or "sqlite"
//! - `HAMO_SQLITE_PATH` - database file (default: `data/hamo.db`)
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` - completion credentials
//! - `GEMINI_MODEL` - model name
//! - `HAMO_COMPLETION_TIMEOUT_SECS` - per-turn completion timeout
//! - `HAMO_HISTORY_WINDOW` - prior turns forwarded to the model
//! - `HAMO_MAX_UPDATE_RETRIES` - trajectory write attempts per message

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::ChatSettings;
use crate::llms::GeminiSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Which [`crate::store::Store`] implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub store: StoreBackend,
    pub sqlite_path: PathBuf,
    pub gemini: GeminiSettings,
    pub chat: ChatSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            store: StoreBackend::Memory,
            sqlite_path: PathBuf::from("data/hamo.db"),
            gemini: GeminiSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from `HAMO_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("HAMO_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        check_timeout(
            "chat.completion_timeout_secs",
            config.chat.completion_timeout_secs,
        )?;
        Ok(config)
    }

    /// Override fields from `lookup` (normally `std::env::var`). Empty
    /// values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORT") {
            self.port = parse("PORT", &v)?;
        }
        if let Some(v) = get("HAMO_STORE") {
            self.store = v.parse().map_err(|value| ConfigError::Invalid {
                key: "HAMO_STORE",
                value,
            })?;
        }
        if let Some(v) = get("HAMO_SQLITE_PATH") {
            self.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("HAMO_COMPLETION_TIMEOUT_SECS") {
            let secs = parse("HAMO_COMPLETION_TIMEOUT_SECS", &v)?;
            check_timeout("HAMO_COMPLETION_TIMEOUT_SECS", secs)?;
            self.chat.completion_timeout_secs = secs;
        }
        if let Some(v) = get("HAMO_HISTORY_WINDOW") {
            let window: usize = parse("HAMO_HISTORY_WINDOW", &v)?;
            self.chat.history_window = window;
            self.gemini.history_window = window;
        }
        if let Some(v) = get("HAMO_MAX_UPDATE_RETRIES") {
            self.chat.max_update_retries = parse("HAMO_MAX_UPDATE_RETRIES", &v)?;
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Timeouts must be finite and positive to become a `Duration`.
fn check_timeout(key: &'static str, secs: f64) -> Result<(), ConfigError> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: secs.to_string(),
        })
    }
}
