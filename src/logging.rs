//! Logging configuration for the termcore binary.
//!
//! The interactive REPL shares the terminal with command output, so it logs
//! to a file. One-shot mode (`-e`) logs warnings to stderr.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where log records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Truncated log file under the state directory.
    File,
    /// Standard error.
    Stderr,
}

impl LogTarget {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(self) -> &'static str {
        match self {
            LogTarget::File => "info",
            LogTarget::Stderr => "warn",
        }
    }
}

/// Installs the global subscriber for `target`.
///
/// If the log file cannot be created the REPL runs without logging.
pub fn init(target: LogTarget) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(target.default_filter()));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        LogTarget::File => {
            let Some(log_file) = open_log_file() else {
                return;
            };
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .init();
        }
    }
}

fn open_log_file() -> Option<File> {
    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            return None;
        }
    }
    // Truncated on each run.
    match File::create(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            None
        }
    }
}

/// Returns the path for the log file.
///
/// Uses the XDG state directory on Linux (`~/.local/state/termcore/termcore.log`),
/// falling back to the config directory, then the temp directory.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("termcore").join("termcore.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("termcore.log"))
}
