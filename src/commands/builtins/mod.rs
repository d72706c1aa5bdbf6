//! Built-in commands.
//!
//! Every session gets these unless the host opts out. They are ordinary
//! processors registered through the same registry as plugin commands.

pub mod alias;
pub mod history;
pub mod jwt;
pub mod system;

use serde_json::json;

use super::descriptor::{Parameter, ParameterType, ProcessorDescriptor, StateConfiguration};
use super::dispatcher::ALIASES_STORE;
use super::registry::ProcessorRegistry;
use crate::error::Result;

/// Registers all built-in commands.
pub fn register_all(registry: &mut ProcessorRegistry) -> Result<()> {
    for descriptor in descriptors() {
        registry.register_processor(descriptor)?;
    }
    Ok(())
}

/// Descriptors of all built-in commands, in help order.
pub fn descriptors() -> Vec<ProcessorDescriptor> {
    vec![
        ProcessorDescriptor::new("help", "Show available commands or help for one command")
            .with_alias("?")
            .with_processor(system::HelpCommand)
            .sealed(),
        ProcessorDescriptor::new("echo", "Print text (or piped input)")
            .with_processor(system::EchoCommand),
        ProcessorDescriptor::new("sleep", "Wait for the given number of milliseconds")
            .value_required()
            .with_processor(system::SleepCommand),
        ProcessorDescriptor::new("clear", "Clear the terminal")
            .with_alias("cls")
            .with_processor(system::ClearCommand),
        ProcessorDescriptor::new("copy", "Copy text (or piped input) to the clipboard")
            .value_required()
            .with_processor(system::CopyCommand),
        ProcessorDescriptor::new("alias", "List aliases or define one: alias <name> <command>")
            .raw_input()
            .with_state(aliases_store())
            .with_processor(alias::AliasCommand),
        ProcessorDescriptor::new("unalias", "Remove an alias")
            .value_required()
            .with_state(aliases_store())
            .with_processor(alias::UnaliasCommand),
        ProcessorDescriptor::new("history", "Show command history")
            .with_parameter(Parameter::new(
                "limit",
                ParameterType::Integer,
                "Show only the newest N entries",
            ))
            .with_processor(history::HistoryCommand)
            .with_subcommand(
                ProcessorDescriptor::new("clear", "Clear command history")
                    .with_processor(history::HistoryClearCommand),
            ),
        ProcessorDescriptor::new("jwt", "JSON Web Token utilities").with_subcommand(
            ProcessorDescriptor::new("decode", "Decode a token's header and payload")
                .value_required()
                .with_processor(jwt::DecodeCommand),
        ),
    ]
}

fn aliases_store() -> StateConfiguration {
    StateConfiguration::new(ALIASES_STORE, json!({}))
}
