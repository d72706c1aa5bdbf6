//! Command history built-ins (`history`, `history clear`).

use async_trait::async_trait;
use serde_json::Value;

use crate::commands::context::ExecutionContext;
use crate::commands::descriptor::CommandProcessor;
use crate::commands::parser::ProcessCommand;
use crate::error::Result;

/// Lists history entries, numbered from 1, oldest first.
pub struct HistoryCommand;

#[async_trait]
impl CommandProcessor for HistoryCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let entries = ctx.history().get_history();
        let skip = command
            .arg_i64("limit")
            .map(|limit| entries.len().saturating_sub(limit.max(0) as usize))
            .unwrap_or(0);

        let mut writer = ctx.writer();
        if entries.is_empty() {
            writer.write_info("History is empty");
        }
        for (index, entry) in entries.iter().enumerate().skip(skip) {
            writer.write_line(&format!("{:>4}  {}", index + 1, entry));
        }

        let shown: Vec<Value> = entries[skip..].iter().cloned().map(Value::String).collect();
        ctx.process().output(Value::Array(shown));
        Ok(())
    }
}

/// Clears the history.
pub struct HistoryClearCommand;

#[async_trait]
impl CommandProcessor for HistoryClearCommand {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.history().clear_history().await?;
        ctx.writer().write_success("History cleared");
        Ok(())
    }
}
