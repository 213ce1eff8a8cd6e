//! Configuration loading and management for precis.
//!
//! Loads settings from `precis.toml` with environment variable overrides for
//! sensitive data and deployment knobs. The config file is optional; defaults
//! apply when it is absent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// LLM agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier (e.g., "gemini-2.0-flash")
    pub model: String,
    /// System persona for the summariser
    pub persona: String,
    /// Upper bound on a single model invocation, in seconds
    pub timeout_secs: u64,
}

/// API keys configuration (loaded from environment)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub google_key: Option<String>,
}

/// Storage paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory summaries are written to
    pub summaries_dir: PathBuf,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Enables debug-level logging
    pub debug: bool,
}

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default location (precis.toml in cwd or home),
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match Self::find_config_file() {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)?
            }
            None => Config::default(),
        };
        config.with_env_overrides()
    }

    /// Apply environment variable overrides on top of file/default values
    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            if !key.trim().is_empty() {
                self.api.google_key = Some(key);
            }
        }
        if let Ok(dir) = std::env::var("SUMMARIES_DIR") {
            self.storage.summaries_dir = PathBuf::from(dir);
        }
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: port,
            })?;
        }
        if let Ok(debug) = std::env::var("DEBUG") {
            self.server.debug = matches!(debug.to_ascii_lowercase().as_str(), "true" | "1");
        }
        Ok(self)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local_config = PathBuf::from("precis.toml");
        if local_config.exists() {
            return Some(local_config);
        }
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("precis").join("precis.toml");
            if home_config.exists() {
                return Some(home_config);
            }
        }
        None
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            persona: "You are an expert document summariser. Read the input, \
                      extract the key points, condense the ideas in plain English, \
                      and highlight themes, key events, or arguments."
                .to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            summaries_dir: PathBuf::from("summaries"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
        }
    }
}
