//! Command line parsing.
//!
//! Turns one pipeline stage of raw input into a [`ProcessCommand`]. When a
//! registry is supplied, the leading words are resolved as a command path
//! (`jwt decode ...`) and the matched processor's declared parameters decide
//! whether `--name value` consumes the following token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::descriptor::{ParameterType, ProcessorDescriptor};
use super::registry::{ProcessorRegistry, Resolved};
use super::tokenizer::{tokenize, ParseError, Spanned, Token};

/// A parsed command, immutable for the duration of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessCommand {
    /// The full original text of this stage.
    pub raw_command: String,
    /// Resolved leaf command name (or the first word when unresolved).
    pub command: String,
    /// Canonical command path from root to leaf.
    pub path: Vec<String>,
    /// First positional, or the verbatim remainder for raw-input processors.
    pub value: Option<String>,
    /// Every unflagged token after the command path.
    pub positionals: Vec<String>,
    /// Flag values keyed by flag name; last occurrence wins.
    pub args: BTreeMap<String, Value>,
    /// Output piped in from the previous pipeline stage.
    pub data: Option<Value>,
}

impl ProcessCommand {
    /// Returns the raw argument value.
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Returns true if the argument is the boolean `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.args.get(name), Some(Value::Bool(true)))
    }

    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }

    pub fn arg_i64(&self, name: &str) -> Option<i64> {
        self.args.get(name).and_then(Value::as_i64)
    }

    pub fn arg_f64(&self, name: &str) -> Option<f64> {
        self.args.get(name).and_then(Value::as_f64)
    }

    /// The effective payload: `value` if present, else the piped `data`
    /// rendered as text.
    pub fn payload(&self) -> Option<String> {
        match (&self.value, &self.data) {
            (Some(value), _) if !value.is_empty() => Some(value.clone()),
            (_, Some(Value::String(s))) => Some(s.clone()),
            (_, Some(Value::Null)) | (_, None) => None,
            (_, Some(other)) => Some(other.to_string()),
        }
    }
}

/// A parsed stage together with the processor it resolved to.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command: ProcessCommand,
    pub resolved: Option<Resolved>,
}

/// Splits a line into pipeline stages on unquoted `|`.
///
/// Returns an empty list for a blank line. Quoting is validated for the
/// whole line before anything runs.
pub fn split_pipeline(line: &str) -> Result<Vec<String>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let tokens = tokenize(trimmed)?;
    let mut stages = Vec::new();
    let mut start = 0;
    for spanned in tokens.iter().filter(|t| t.token == Token::Pipe) {
        stages.push(stage_text(trimmed, start, spanned.start)?);
        start = spanned.end;
    }
    stages.push(stage_text(trimmed, start, trimmed.len())?);
    Ok(stages)
}

fn stage_text(line: &str, start: usize, end: usize) -> Result<String, ParseError> {
    let text = line[start..end].trim();
    if text.is_empty() {
        return Err(ParseError::new(line, "Empty command in pipeline")
            .at(start)
            .with_hint("Put a command on both sides of '|'"));
    }
    Ok(text.to_string())
}

/// Parses a single stage without a registry: the first word is the command
/// and nothing is treated as a subcommand.
///
/// Returns `Ok(None)` for empty or whitespace-only input.
pub fn parse(line: &str) -> Result<Option<ProcessCommand>, ParseError> {
    Ok(parse_stage(line, None)?.map(|parsed| parsed.command))
}

/// Parses a single stage, resolving the command path against `registry`.
pub fn parse_with(
    line: &str,
    registry: &ProcessorRegistry,
) -> Result<Option<ParsedCommand>, ParseError> {
    parse_stage(line, Some(registry))
}

fn parse_stage(
    line: &str,
    registry: Option<&ProcessorRegistry>,
) -> Result<Option<ParsedCommand>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens = tokenize(trimmed)?;
    if let Some(pipe) = tokens.iter().find(|t| t.token == Token::Pipe) {
        return Err(ParseError::new(trimmed, "Unexpected '|'")
            .at(pipe.start)
            .with_hint("Pipelines must be split before parsing a stage"));
    }
    let Some((first, rest)) = tokens.split_first() else {
        return Ok(None);
    };

    let head = match &first.token {
        Token::Word(text) => text.clone(),
        _ => trimmed[first.start..first.end].to_string(),
    };
    let leading: Vec<&str> = rest.iter().map_while(|t| t.token.as_word()).collect();
    let resolved = registry.and_then(|r| r.find_processor(&head, leading.as_slice()));
    let consumed = resolved.as_ref().map(|r| r.consumed).unwrap_or(0);
    let descriptor = resolved.as_ref().map(|r| r.descriptor.as_ref());

    let (value, positionals, args) = bind_tokens(trimmed, &rest[consumed..], descriptor);

    let command = ProcessCommand {
        raw_command: trimmed.to_string(),
        command: descriptor.map(|d| d.command.clone()).unwrap_or_else(|| head.clone()),
        path: resolved
            .as_ref()
            .map(|r| r.path.clone())
            .unwrap_or_else(|| vec![head]),
        value,
        positionals,
        args,
        data: None,
    };

    Ok(Some(ParsedCommand { command, resolved }))
}

type Bound = (Option<String>, Vec<String>, BTreeMap<String, Value>);

/// Sorts the tokens after the command path into value, positionals and args.
fn bind_tokens(line: &str, tokens: &[Spanned], descriptor: Option<&ProcessorDescriptor>) -> Bound {
    let raw_mode = descriptor.map(|d| d.accepts_raw_input).unwrap_or(false);
    let mut args = BTreeMap::new();
    let mut positionals = Vec::new();
    let mut raw_value = None;
    let mut iter = tokens.iter().peekable();

    while let Some(spanned) = iter.next() {
        match &spanned.token {
            Token::Word(text) => {
                positionals.push(text.clone());
                if raw_mode {
                    raw_value = Some(line[spanned.start..].trim_end().to_string());
                    positionals.extend(
                        iter.by_ref()
                            .filter_map(|t| t.token.as_word().map(String::from)),
                    );
                    break;
                }
            }
            Token::LongFlag { name, value } | Token::ShortFlag { name, value } => {
                let parsed = match value {
                    Some(v) => Value::String(v.clone()),
                    None if takes_value(descriptor, name) => {
                        match iter.peek().and_then(|t| t.token.as_word()) {
                            Some(next) => {
                                let next = next.to_string();
                                iter.next();
                                Value::String(next)
                            }
                            None => Value::Bool(true),
                        }
                    }
                    None => Value::Bool(true),
                };
                args.insert(name.clone(), parsed);
            }
            Token::Pipe => {}
        }
    }

    let value = raw_value.or_else(|| positionals.first().cloned());
    (value, positionals, args)
}

fn takes_value(descriptor: Option<&ProcessorDescriptor>, flag: &str) -> bool {
    descriptor
        .and_then(|d| d.find_parameter(flag))
        .map(|p| p.kind != ParameterType::Boolean)
        .unwrap_or(false)
}
