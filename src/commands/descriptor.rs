//! Processor descriptors: the declarative shape of a command.
//!
//! A [`ProcessorDescriptor`] describes a command's name, aliases, parameters,
//! nested subcommands and flags, and optionally carries the
//! [`CommandProcessor`] that executes it. Descriptors are plain values handed
//! to the registry; once registered they are shared immutably behind `Arc`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::ExecutionContext;
use super::parser::ProcessCommand;
use crate::error::Result;
use crate::io::Writer;

/// Behaviour attached to a descriptor.
///
/// Implementations run on the session's single cooperative task; the only
/// suspension points are the `.await`s inside them.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    /// Runs the command.
    ///
    /// Returning `Err(EngineError::ProcessExited(code))` (usually via
    /// `ctx.process().exit(code)`) finishes the command with that exit code;
    /// any other error is reported as a command crash.
    async fn process_command(
        &self,
        command: &ProcessCommand,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<()>;

    /// Called once per session before the first `process_command`.
    async fn initialize(&self, _ctx: &mut ExecutionContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Writes a custom description for `help`.
    ///
    /// Returns false when the processor has none, in which case a usage
    /// summary is generated from the descriptor.
    fn write_description(&self, _writer: &mut Writer<'_>) -> bool {
        false
    }
}

/// Type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParameterType {
    /// Returns the type name used in messages and help output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// A declared `--name` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub kind: ParameterType,
    pub required: bool,
    pub default_value: Option<Value>,
}

impl Parameter {
    /// Creates an optional parameter with no default.
    pub fn new(name: impl Into<String>, kind: ParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: description.into(),
            kind,
            required: false,
            default_value: None,
        }
    }

    /// Adds an alternate flag name (used as `-alias`).
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Marks the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value bound when the flag is absent.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Returns true if `flag` is this parameter's name or one of its aliases.
    pub fn matches(&self, flag: &str) -> bool {
        self.name == flag || self.aliases.iter().any(|a| a == flag)
    }
}

/// Registry-facing metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorMetadata {
    /// Sealed processors can be neither replaced nor unregistered.
    pub sealed: bool,
    /// Minimum engine version (bare version = floor, otherwise a semver range).
    pub required_core_version: Option<String>,
    /// Minimum host CLI version, same format.
    pub required_cli_version: Option<String>,
}

/// Declares the named state store a processor works with.
#[derive(Debug, Clone, PartialEq)]
pub struct StateConfiguration {
    pub store_name: String,
    pub initial_state: Value,
}

impl StateConfiguration {
    pub fn new(store_name: impl Into<String>, initial_state: Value) -> Self {
        Self {
            store_name: store_name.into(),
            initial_state,
        }
    }
}

/// A registered (or to-be-registered) command.
#[derive(Clone)]
pub struct ProcessorDescriptor {
    pub command: String,
    pub aliases: Vec<String>,
    pub description: String,
    pub parameters: Vec<Parameter>,
    /// The remainder of the line after the command path becomes `value` verbatim.
    pub accepts_raw_input: bool,
    /// This root processor receives lines whose first word matches nothing.
    pub allow_unlisted_commands: bool,
    pub value_required: bool,
    pub metadata: ProcessorMetadata,
    pub processors: Vec<Arc<ProcessorDescriptor>>,
    pub state_configuration: Option<StateConfiguration>,
    pub processor: Option<Arc<dyn CommandProcessor>>,
}

impl ProcessorDescriptor {
    /// Creates a descriptor with no behaviour attached.
    pub fn new(command: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            aliases: Vec::new(),
            description: description.into(),
            parameters: Vec::new(),
            accepts_raw_input: false,
            allow_unlisted_commands: false,
            value_required: false,
            metadata: ProcessorMetadata::default(),
            processors: Vec::new(),
            state_configuration: None,
            processor: None,
        }
    }

    pub fn with_processor(mut self, processor: impl CommandProcessor + 'static) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_subcommand(mut self, child: ProcessorDescriptor) -> Self {
        self.processors.push(Arc::new(child));
        self
    }

    pub fn with_state(mut self, config: StateConfiguration) -> Self {
        self.state_configuration = Some(config);
        self
    }

    pub fn raw_input(mut self) -> Self {
        self.accepts_raw_input = true;
        self
    }

    pub fn allow_unlisted(mut self) -> Self {
        self.allow_unlisted_commands = true;
        self
    }

    pub fn value_required(mut self) -> Self {
        self.value_required = true;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.metadata.sealed = true;
        self
    }

    pub fn requires_core(mut self, requirement: impl Into<String>) -> Self {
        self.metadata.required_core_version = Some(requirement.into());
        self
    }

    pub fn requires_cli(mut self, requirement: impl Into<String>) -> Self {
        self.metadata.required_cli_version = Some(requirement.into());
        self
    }

    /// Returns the declared parameter matching a flag name or alias.
    pub fn find_parameter(&self, flag: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.matches(flag))
    }

    /// Returns every key this descriptor answers to (command first).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.command.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl fmt::Debug for ProcessorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorDescriptor")
            .field("command", &self.command)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("accepts_raw_input", &self.accepts_raw_input)
            .field("allow_unlisted_commands", &self.allow_unlisted_commands)
            .field("value_required", &self.value_required)
            .field("metadata", &self.metadata)
            .field("processors", &self.processors)
            .field("has_processor", &self.processor.is_some())
            .finish()
    }
}
