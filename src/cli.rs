//! Command-line argument parsing for the termcore binary.

use crate::config::{EngineConfig, StorageKind};
use clap::Parser;
use std::path::PathBuf;

/// Interactive command engine for terminals.
#[derive(Parser, Debug)]
#[command(name = "termcore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep history and state in memory only
    #[arg(long)]
    pub memory: bool,

    /// Storage file path (overrides the config file)
    #[arg(long, value_name = "PATH", env = "TERMCORE_STORAGE")]
    pub storage: Option<PathBuf>,

    /// Execute one command line and exit with its exit code
    #[arg(short = 'e', long, value_name = "LINE")]
    pub execute: Option<String>,

    /// Start without the built-in commands
    #[arg(long)]
    pub no_builtins: bool,

    /// Prompt string
    #[arg(long, value_name = "PROMPT")]
    pub prompt: Option<String>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(EngineConfig::default_path)
    }

    /// Returns true in one-shot (`-e`) mode.
    pub fn is_one_shot(&self) -> bool {
        self.execute.is_some()
    }

    /// Applies command-line overrides on top of a loaded config.
    pub fn apply(&self, config: &mut EngineConfig) {
        if self.memory {
            config.storage.backend = StorageKind::Memory;
        }
        if let Some(path) = &self.storage {
            config.storage.path = Some(path.clone());
        }
        if self.no_builtins {
            config.session.builtins = false;
        }
        if let Some(prompt) = &self.prompt {
            config.session.prompt = prompt.clone();
        }
    }
}
