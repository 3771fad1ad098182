//! Configuration file support

use kinesis_ai::{DEFAULT_BASE_URL, DEFAULT_MODEL, EndpointConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for kinesis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the model server
    pub base_url: Option<String>,
    /// Model to generate with
    pub model: Option<String>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kinesis")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for KINESIS_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("KINESIS_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from a file. Missing or unreadable files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config file");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config file");
                Self::default()
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            model: Some(DEFAULT_MODEL.to_string()),
        };

        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Resolve the endpoint. Flags win over the file, the file over defaults.
    pub fn endpoint(&self, url: Option<String>, model: Option<String>) -> EndpointConfig {
        let base_url = url
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = model
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        EndpointConfig::new(base_url, model)
    }

    /// Remember the endpoint settings
    pub fn remember(&mut self, endpoint: &EndpointConfig) {
        self.base_url = Some(endpoint.base_url.clone());
        self.model = Some(endpoint.model.clone());
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# kinesis configuration file
# Place at ~/.config/kinesis/config.toml (Linux) or set KINESIS_CONFIG_PATH

# Base URL of the Ollama server
base_url = "http://localhost:11434"

# Model to draft with (see `kinesis --list-models`)
model = "llama3.2"
"#
}
