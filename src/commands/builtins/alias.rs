//! User-defined command aliases.
//!
//! Aliases live in the `aliases` state store as `name → expansion` and are
//! expanded by the dispatcher when a line starts with an alias name.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

use crate::commands::context::ExecutionContext;
use crate::commands::descriptor::CommandProcessor;
use crate::commands::parser::ProcessCommand;
use crate::error::{EngineError, Result};

fn alias_name_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*$")
        .map_err(|e| EngineError::internal(format!("Invalid alias pattern: {e}")))?;
    Ok(PATTERN.get_or_init(|| pattern))
}

/// Splits `name rest...` into the name and the expansion, dropping one
/// pair of quotes that encloses the whole expansion.
fn split_definition(raw: &str) -> (&str, &str) {
    let raw = raw.trim();
    let (name, rest) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
    let rest = rest.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|&q| rest.strip_prefix(q).and_then(|r| r.strip_suffix(q)))
        .filter(|inner| !inner.is_empty());
    (name, unquoted.unwrap_or(rest))
}

/// `alias` lists aliases; `alias <name>` shows one; `alias <name> <command>`
/// defines one.
pub struct AliasCommand;

#[async_trait]
impl CommandProcessor for AliasCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let raw = command.value.clone().unwrap_or_default();
        let (name, expansion) = split_definition(&raw);

        if name.is_empty() {
            let aliases = ctx.state()?.state().clone();
            let mut writer = ctx.writer();
            match aliases.as_object().filter(|map| !map.is_empty()) {
                Some(map) => {
                    for (name, expansion) in map {
                        let expansion = expansion.as_str().unwrap_or_default();
                        writer.write_line(&format!("{name}='{expansion}'"));
                    }
                }
                None => writer.write_info("No aliases defined"),
            }
            ctx.process().output(aliases);
            return Ok(());
        }

        if expansion.is_empty() {
            let existing = ctx.state()?.get(name).and_then(Value::as_str).map(str::to_string);
            return match existing {
                Some(expansion) => {
                    ctx.writer().write_line(&format!("{name}='{expansion}'"));
                    ctx.process().output(expansion);
                    Ok(())
                }
                None => {
                    ctx.writer().write_error(&format!("Alias {name} not found"));
                    ctx.process().exit(-1)
                }
            };
        }

        if !alias_name_pattern()?.is_match(name) {
            ctx.writer().write_error(&format!("Invalid alias name: {name}"));
            return ctx.process().exit(-1);
        }
        if ["alias", "unalias"].iter().any(|r| r.eq_ignore_ascii_case(name)) {
            ctx.writer().write_error(&format!("Cannot alias '{name}'"));
            return ctx.process().exit(-1);
        }

        let mut patch = Map::new();
        patch.insert(name.to_string(), Value::from(expansion));
        let store = ctx.state()?;
        store.update_state(Value::Object(patch));
        store.persist().await?;
        ctx.writer().write_success(&format!("Alias {name} set to '{expansion}'"));
        Ok(())
    }
}

/// `unalias <name>`
pub struct UnaliasCommand;

#[async_trait]
impl CommandProcessor for UnaliasCommand {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let name = command.payload().unwrap_or_default();
        let store = ctx.state()?;
        if store.remove_key(&name).is_none() {
            ctx.writer().write_error(&format!("Alias {name} not found"));
            return ctx.process().exit(-1);
        }
        store.persist().await?;
        ctx.writer().write_success(&format!("Alias {name} removed"));
        Ok(())
    }
}
