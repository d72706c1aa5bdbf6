//! Error types for termcore.
//!
//! Defines the main error enum used throughout the engine.

use thiserror::Error;

use crate::commands::tokenizer::ParseError;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input line (unterminated quote, empty pipe stage).
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// No processor matches the command and no catch-all is registered.
    #[error("Unknown command: {0}. Type 'help' for available commands.")]
    UnknownCommand(String),

    /// The processor requires a value but none was given.
    #[error("Missing value: '{command}' requires a value")]
    MissingValue { command: String },

    /// A required parameter was not supplied and has no default.
    #[error("Missing parameter: '{command}' requires --{parameter}")]
    MissingParameter { command: String, parameter: String },

    /// A parameter value could not be coerced to its declared type.
    #[error("Invalid parameter: --{parameter} expects {expected}, got '{value}'")]
    InvalidParameterType {
        parameter: String,
        expected: &'static str,
        value: String,
    },

    /// The processor needs a newer (or different) host version.
    #[error("Incompatible version: '{command}' requires {component} {required}, host has {actual}")]
    VersionIncompatible {
        command: String,
        component: &'static str,
        required: String,
        actual: String,
    },

    /// The processor is sealed and cannot be replaced or removed.
    #[error("Processor '{0}' is sealed")]
    SealedProcessor(String),

    /// Raised by a command through `process.exit(code)`.
    #[error("Process exited with code {0}")]
    ProcessExited(i32),

    /// Generic failure raised by a command.
    #[error("Command error: {0}")]
    Command(String),

    /// Persistence backend errors.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Clipboard errors.
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// Configuration errors (invalid config file, bad version string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal engine errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates a command error with the given message.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a clipboard error with the given message.
    pub fn clipboard(msg: impl Into<String>) -> Self {
        Self::Clipboard(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Parse(_) => "Parse Error",
            Self::UnknownCommand(_) => "Unknown Command",
            Self::MissingValue { .. } | Self::MissingParameter { .. } => "Missing Argument",
            Self::InvalidParameterType { .. } => "Invalid Argument",
            Self::VersionIncompatible { .. } => "Version Error",
            Self::SealedProcessor(_) => "Registry Error",
            Self::ProcessExited(_) => "Process Exit",
            Self::Command(_) => "Command Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Clipboard(_) => "Clipboard Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
