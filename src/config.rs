//! Configuration management for the termcore binary.
//!
//! Loads an optional TOML file. Every field has a default, so a missing file
//! or an empty one yields a working configuration.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Where history, state stores and plugin records are kept.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Command prompt.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Whether the engine echoes typed characters.
    ///
    /// A line-buffered host terminal already echoes, so the binary
    /// defaults to off.
    #[serde(default)]
    pub echo: bool,

    /// Host CLI version checked against `required_cli_version`.
    pub cli_version: Option<String>,

    /// Register the built-in commands.
    #[serde(default = "default_true")]
    pub builtins: bool,
}

fn default_prompt() -> String {
    crate::session::DEFAULT_PROMPT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            echo: false,
            cli_version: None,
            builtins: true,
        }
    }
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Nothing survives the process.
    Memory,
    /// A JSON file on disk.
    #[default]
    File,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// File path for the file backend. Defaults to the platform data dir.
    pub path: Option<PathBuf>,
}

impl EngineConfig {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termcore")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            EngineError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }
}
