//! Command dispatcher.
//!
//! Runs one input line against a session: records it in history, splits it
//! into pipeline stages, and drives each stage through
//! `Parsed → Resolved → Bound → Initialized → Running` to a final
//! [`CommandStatus`]. Engine-level failures (bad input, unknown commands,
//! invalid parameters) are written to the output as error lines and never
//! reach the command.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};

use super::context::ExecutionContext;
use super::descriptor::{Parameter, ParameterType, ProcessorDescriptor};
use super::help;
use super::parser::{parse_with, split_pipeline, ProcessCommand};
use crate::error::{EngineError, Result};
use crate::io::Writer;
use crate::session::EngineSession;

/// Name of the state store holding user-defined command aliases.
pub const ALIASES_STORE: &str = "aliases";

/// Exit code reported for a command cancelled by the user.
pub const ABORTED_EXIT_CODE: i32 = 130;

/// Final state of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Succeeded,
    /// The command called `process.exit(code)` with a non-zero code.
    Exited(i32),
    /// The engine refused to run the command (parse error, unknown command,
    /// missing or invalid parameters).
    Rejected(String),
    /// The command returned an error of its own.
    Crashed(String),
    /// The user cancelled the command.
    Aborted,
}

/// Outcome of executing a line.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub status: CommandStatus,
    /// Value emitted through `process.output` by the last stage that ran.
    pub output: Option<Value>,
}

impl CommandResult {
    pub fn succeeded(output: Option<Value>) -> Self {
        Self {
            status: CommandStatus::Succeeded,
            output,
        }
    }

    fn with_status(status: CommandStatus) -> Self {
        Self {
            status,
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Succeeded
    }

    pub fn exit_code(&self) -> i32 {
        match &self.status {
            CommandStatus::Succeeded => 0,
            CommandStatus::Exited(code) => *code,
            CommandStatus::Rejected(_) | CommandStatus::Crashed(_) => 1,
            CommandStatus::Aborted => ABORTED_EXIT_CODE,
        }
    }
}

/// Records `line` in history and runs it.
pub async fn execute(session: &mut EngineSession, line: &str) -> CommandResult {
    if line.trim().is_empty() {
        return CommandResult::succeeded(None);
    }
    if let Err(e) = session.history.add_command(line).await {
        warn!("Failed to record history: {e}");
    }
    run_line(session, line).await
}

/// Runs every pipeline stage of `line` in order without touching history.
///
/// Stops at the first stage that does not succeed.
pub(crate) fn run_line<'s>(
    session: &'s mut EngineSession,
    line: &'s str,
) -> BoxFuture<'s, CommandResult> {
    async move {
        let stages = match split_pipeline(line) {
            Ok(stages) => stages,
            Err(e) => return reject(session, EngineError::from(e)),
        };

        let mut result = CommandResult::succeeded(None);
        let mut data = None;
        for stage in &stages {
            result = run_stage(session, stage, data.take()).await;
            if !result.is_success() {
                break;
            }
            data = result.output.clone();
        }
        result
    }
    .boxed()
}

async fn run_stage(session: &mut EngineSession, text: &str, data: Option<Value>) -> CommandResult {
    let text = expand_user_alias(session, text).await;

    let parsed = match parse_with(&text, &session.registry) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => return CommandResult::succeeded(data),
        Err(e) => return reject(session, EngineError::from(e)),
    };
    let mut command = parsed.command;
    command.data = data;
    debug!(command = %command.command, phase = "parsed");

    let resolved = match parsed.resolved {
        Some(resolved) => resolved,
        None => match session.registry.unlisted_handler() {
            Some(handler) => {
                command.positionals.insert(0, command.command.clone());
                command.value = Some(command.command.clone());
                command.path = handler.path.clone();
                handler
            }
            None => return reject(session, EngineError::UnknownCommand(command.command)),
        },
    };
    let descriptor = resolved.descriptor;
    debug!(command = %command.command, path = ?resolved.path, phase = "resolved");

    let wants_help = command.args.contains_key("help") && descriptor.find_parameter("help").is_none();
    let Some(processor) = descriptor.processor.clone().filter(|_| !wants_help) else {
        return show_help(session, &resolved.path);
    };

    if let Err(e) = bind_parameters(&descriptor, &mut command) {
        return reject(session, e);
    }
    if descriptor.value_required && command.payload().is_none() {
        return reject(
            session,
            EngineError::MissingValue {
                command: resolved.path.join(" "),
            },
        );
    }
    debug!(command = %command.command, args = ?command.args, phase = "bound");

    if let Some(config) = &descriptor.state_configuration {
        if let Err(e) = session.stores.get_or_load(config).await {
            return reject(session, e);
        }
    }

    let abort = session.input.renew_abort();
    let first_run = !session.is_initialized(&descriptor);
    let mut ctx = ExecutionContext::new(session, Arc::clone(&descriptor), abort.clone());

    if first_run {
        if let Err(e) = processor.initialize(&mut ctx).await {
            drop(ctx);
            return crash(session, &command, e);
        }
        ctx.session().mark_initialized(&descriptor);
        debug!(command = %command.command, phase = "initialized");
    }

    debug!(command = %command.command, phase = "running");
    let outcome = processor.process_command(&command, &mut ctx).await;
    let output = ctx.into_output();

    let result = match outcome {
        Err(EngineError::ProcessExited(code)) if code != 0 => CommandResult {
            status: CommandStatus::Exited(code),
            output,
        },
        _ if abort.is_cancelled() => CommandResult::with_status(CommandStatus::Aborted),
        Ok(()) | Err(EngineError::ProcessExited(_)) => CommandResult::succeeded(output),
        Err(e) => return crash(session, &command, e),
    };
    debug!(command = %command.command, status = ?result.status, phase = "finished");
    result
}

/// Replaces the first word of `text` with its user alias, if one exists.
async fn expand_user_alias(session: &mut EngineSession, text: &str) -> String {
    let Some((head, rest)) = split_first_word(text) else {
        return text.to_string();
    };
    let store = match session.alias_store().await {
        Ok(store) => store,
        Err(e) => {
            warn!("Failed to load aliases: {e}");
            return text.to_string();
        }
    };
    match store.get(head).and_then(Value::as_str) {
        Some(expansion) => {
            debug!(alias = head, expansion, "Expanding user alias");
            format!("{expansion}{rest}")
        }
        None => text.to_string(),
    }
}

fn split_first_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() || text.starts_with(['"', '\'']) {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some(text.split_at(end))
}

/// Coerces declared parameters in `command.args` to their types, applying
/// defaults. Undeclared flags are left as parsed.
pub fn bind_parameters(descriptor: &ProcessorDescriptor, command: &mut ProcessCommand) -> Result<()> {
    let mut bound = BTreeMap::new();

    for param in &descriptor.parameters {
        let supplied = std::iter::once(&param.name)
            .chain(&param.aliases)
            .filter_map(|key| command.args.remove(key))
            .last();

        match supplied {
            Some(raw) => match coerce(param, &raw) {
                Some(value) => {
                    bound.insert(param.name.clone(), value);
                }
                None if param.required => {
                    return Err(EngineError::InvalidParameterType {
                        parameter: param.name.clone(),
                        expected: param.kind.as_str(),
                        value: display_raw(&raw),
                    });
                }
                None => {
                    warn!(
                        parameter = %param.name,
                        expected = param.kind.as_str(),
                        value = %display_raw(&raw),
                        "Ignoring invalid parameter value"
                    );
                    if let Some(default) = &param.default_value {
                        bound.insert(param.name.clone(), default.clone());
                    }
                }
            },
            None => match &param.default_value {
                Some(default) => {
                    bound.insert(param.name.clone(), default.clone());
                }
                None if param.required => {
                    return Err(EngineError::MissingParameter {
                        command: descriptor.command.clone(),
                        parameter: param.name.clone(),
                    });
                }
                None => {}
            },
        }
    }

    command.args.extend(bound);
    Ok(())
}

fn coerce(param: &Parameter, raw: &Value) -> Option<Value> {
    match (param.kind, raw) {
        (ParameterType::String, Value::String(_)) => Some(raw.clone()),
        (ParameterType::Boolean, Value::Bool(_)) => Some(raw.clone()),
        (ParameterType::Boolean, Value::String(s)) => Some(Value::Bool(matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "1" | "yes"
        ))),
        (ParameterType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ParameterType::Number, Value::String(s)) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                return Some(Value::from(n));
            }
            s.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        (ParameterType::Integer | ParameterType::Number, Value::Number(_)) => Some(raw.clone()),
        _ => None,
    }
}

fn display_raw(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Bool(true) => String::new(),
        other => other.to_string(),
    }
}

fn show_help(session: &mut EngineSession, path: &[String]) -> CommandResult {
    let mut writer = Writer::new(session.output.as_mut());
    match help::write_help(&session.registry, path, &mut writer) {
        Ok(()) => CommandResult::succeeded(None),
        Err(e) => reject(session, e),
    }
}

fn reject(session: &mut EngineSession, error: EngineError) -> CommandResult {
    debug!(category = error.category(), phase = "rejected", "{error}");
    Writer::new(session.output.as_mut()).write_error(&error.to_string());
    CommandResult::with_status(CommandStatus::Rejected(error.to_string()))
}

fn crash(session: &mut EngineSession, command: &ProcessCommand, error: EngineError) -> CommandResult {
    warn!(command = %command.command, "Command failed: {error}");
    Writer::new(session.output.as_mut()).write_error(&error.to_string());
    CommandResult::with_status(CommandStatus::Crashed(error.to_string()))
}
