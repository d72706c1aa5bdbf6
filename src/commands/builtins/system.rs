//! General built-ins (help, echo, sleep, clear, copy).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::commands::context::ExecutionContext;
use crate::commands::descriptor::CommandProcessor;
use crate::commands::parser::ProcessCommand;
use crate::error::Result;

/// `help [command...]`
pub struct HelpCommand;

#[async_trait]
impl CommandProcessor for HelpCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.show_help(&command.positionals)
    }
}

/// `echo [text...]`: prints its arguments, or the piped input when there
/// are none, and passes the text on.
pub struct EchoCommand;

#[async_trait]
impl CommandProcessor for EchoCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let text = if command.positionals.is_empty() {
            command.payload().unwrap_or_default()
        } else {
            command.positionals.join(" ")
        };

        let mut writer = ctx.writer();
        for line in text.split('\n') {
            writer.write_line(line);
        }
        ctx.process().output(Value::String(text));
        Ok(())
    }
}

/// `sleep <ms>`: waits, returning early if the command is aborted.
pub struct SleepCommand;

#[async_trait]
impl CommandProcessor for SleepCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let raw = command.payload().unwrap_or_default();
        let millis = match raw.trim().parse::<f64>() {
            Ok(ms) if ms.is_finite() && ms >= 0.0 => ms,
            _ => {
                ctx.writer().write_error(&format!("Invalid value: {raw}"));
                return ctx.process().exit(-1);
            }
        };

        let abort = ctx.abort_signal();
        debug!(millis, "Sleeping");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(millis / 1000.0)) => {}
            _ = abort.cancelled() => debug!("Sleep aborted"),
        }
        Ok(())
    }
}

/// `clear`
pub struct ClearCommand;

#[async_trait]
impl CommandProcessor for ClearCommand {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.writer().clear();
        Ok(())
    }
}

/// `copy <text>`: writes the text (or piped input) to the clipboard.
pub struct CopyCommand;

#[async_trait]
impl CommandProcessor for CopyCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let text = if command.data.is_some() && command.positionals.is_empty() {
            command.payload().unwrap_or_default()
        } else {
            command.positionals.join(" ")
        };

        ctx.clipboard().write(&text).await?;
        ctx.writer().write_success("Copied to clipboard");
        ctx.process().output(Value::String(text));
        Ok(())
    }
}
