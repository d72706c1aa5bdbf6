//! Help output for registered commands.
//!
//! `help` with no path lists the root commands; with a path it prints the
//! processor's own description when it provides one, otherwise a usage
//! summary generated from its parameters and subcommands.

use std::sync::Arc;

use super::descriptor::{Parameter, ProcessorDescriptor};
use super::registry::ProcessorRegistry;
use crate::error::{EngineError, Result};
use crate::io::Writer;

/// Writes help for `path`, or the command list when `path` is empty.
pub fn write_help(registry: &ProcessorRegistry, path: &[String], writer: &mut Writer<'_>) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        write_command_list(&registry.roots(), writer);
        return Ok(());
    };

    let resolved = registry
        .find_processor(first, rest)
        .filter(|r| r.consumed == rest.len())
        .ok_or_else(|| EngineError::UnknownCommand(path.join(" ")))?;

    let descriptor = resolved.descriptor;
    if let Some(processor) = &descriptor.processor {
        if processor.write_description(writer) {
            return Ok(());
        }
    }
    let keys: Vec<&str> = resolved.path.iter().map(String::as_str).collect();
    let subcommands = registry.children(&keys);
    for line in usage_lines(&resolved.path, &descriptor, &subcommands) {
        writer.write_line(&line);
    }
    Ok(())
}

fn write_command_list(roots: &[Arc<ProcessorDescriptor>], writer: &mut Writer<'_>) {
    writer.write_line("Available commands:");
    for line in command_lines(roots) {
        writer.write_line(&line);
    }
    writer.write_line("");
    writer.write_line("Type 'help <command>' for details.");
}

/// One aligned line per descriptor: `  name, alias  - description`.
fn command_lines(descriptors: &[Arc<ProcessorDescriptor>]) -> Vec<String> {
    let names: Vec<String> = descriptors
        .iter()
        .map(|d| d.keys().collect::<Vec<_>>().join(", "))
        .collect();
    let width = names.iter().map(|n| n.chars().count()).max().unwrap_or(0);

    descriptors
        .iter()
        .zip(names)
        .map(|(d, name)| {
            if d.description.is_empty() {
                format!("  {name}")
            } else {
                format!("  {:<width$}  - {}", name, d.description, width = width)
            }
        })
        .collect()
}

/// Generated usage summary for one processor, listing the `subcommands`
/// currently registered beneath it.
pub fn usage_lines(
    path: &[String],
    descriptor: &ProcessorDescriptor,
    subcommands: &[Arc<ProcessorDescriptor>],
) -> Vec<String> {
    let full = path.join(" ");
    let mut lines = Vec::new();

    if descriptor.description.is_empty() {
        lines.push(full.clone());
    } else {
        lines.push(format!("{full} - {}", descriptor.description));
    }
    lines.push(String::new());

    let mut usage = format!("Usage: {full}");
    if !subcommands.is_empty() {
        usage.push_str(" <subcommand>");
    }
    if !descriptor.parameters.is_empty() {
        usage.push_str(" [options]");
    }
    if descriptor.accepts_raw_input {
        usage.push_str(" <input...>");
    } else if descriptor.value_required {
        usage.push_str(" <value>");
    }
    lines.push(usage);

    if !descriptor.aliases.is_empty() {
        lines.push(format!("Aliases: {}", descriptor.aliases.join(", ")));
    }

    if !subcommands.is_empty() {
        lines.push(String::new());
        lines.push("Subcommands:".to_string());
        lines.extend(command_lines(subcommands));
    }

    if !descriptor.parameters.is_empty() {
        lines.push(String::new());
        lines.push("Options:".to_string());
        let flags: Vec<String> = descriptor.parameters.iter().map(flag_text).collect();
        let width = flags.iter().map(|f| f.chars().count()).max().unwrap_or(0);
        for (param, flag) in descriptor.parameters.iter().zip(flags) {
            lines.push(format!(
                "  {:<width$}  {}",
                flag,
                parameter_notes(param),
                width = width
            ));
        }
    }

    lines
}

fn flag_text(param: &Parameter) -> String {
    let mut text = format!("--{}", param.name);
    for alias in &param.aliases {
        text.push_str(&format!(", -{alias}"));
    }
    text.push_str(&format!(" <{}>", param.kind.as_str()));
    text
}

fn parameter_notes(param: &Parameter) -> String {
    let mut notes = param.description.clone();
    if param.required {
        notes.push_str(" (required)");
    }
    if let Some(default) = &param.default_value {
        notes.push_str(&format!(" (default: {default})"));
    }
    notes.trim().to_string()
}
