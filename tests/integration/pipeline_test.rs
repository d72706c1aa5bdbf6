//! Pipelines, nested execution and user aliases.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use termcore::commands::ExecutionContext;
use termcore::{CommandProcessor, CommandStatus, ProcessCommand, ProcessorDescriptor, Result};

use super::session_with;

/// Upper-cases its payload.
struct Upper;

#[async_trait]
impl CommandProcessor for Upper {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let text = command.payload().unwrap_or_default().to_uppercase();
        ctx.writer().write_line(&text);
        ctx.process().output(text);
        Ok(())
    }
}

/// Reports the type of the piped data.
struct DataKind;

#[async_trait]
impl CommandProcessor for DataKind {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let kind = match &command.data {
            None => "none",
            Some(Value::Array(_)) => "array",
            Some(Value::Object(_)) => "object",
            Some(Value::String(_)) => "string",
            Some(_) => "other",
        };
        ctx.process().output(kind);
        Ok(())
    }
}

/// Runs `echo` twice through the context.
struct Twice;

#[async_trait]
impl CommandProcessor for Twice {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let line = format!("echo {}", command.value.clone().unwrap_or_default());
        let first = ctx.execute(&line).await;
        let second = ctx.execute(&line).await;
        ctx.process().output(json!([first.output, second.output]));
        Ok(())
    }
}

fn extras() -> Vec<ProcessorDescriptor> {
    vec![
        ProcessorDescriptor::new("upper", "Upper-case text").with_processor(Upper),
        ProcessorDescriptor::new("kind", "Type of piped data").with_processor(DataKind),
        ProcessorDescriptor::new("twice", "Echo twice").with_processor(Twice),
    ]
}

#[tokio::test]
async fn test_output_becomes_next_data() {
    let (mut session, _handle, sink) = session_with(extras()).await;
    let result = session.execute("echo hello | upper").await;

    assert!(result.is_success());
    assert_eq!(result.output, Some(json!("HELLO")));
    assert_eq!(sink.lines(), vec!["hello", "HELLO"]);
    assert_eq!(session.history().get_history(), vec!["echo hello | upper"]);
}

#[tokio::test]
async fn test_three_stage_pipeline_keeps_json_values() {
    let (mut session, _handle, _sink) = session_with(extras()).await;
    session.execute("echo one").await;

    let result = session.execute("history | kind").await;
    assert_eq!(result.output, Some(json!("array")));

    let result = session.execute("echo a | upper | kind").await;
    assert_eq!(result.output, Some(json!("string")));

    let result = session.execute("kind").await;
    assert_eq!(result.output, Some(json!("none")));
}

#[tokio::test]
async fn test_quoted_pipe_is_literal() {
    let (mut session, _handle, _sink) = session_with(extras()).await;
    let result = session.execute("echo 'a | b'").await;
    assert_eq!(result.output, Some(json!("a | b")));
}

#[tokio::test]
async fn test_empty_stage_is_rejected() {
    let (mut session, _handle, sink) = session_with(extras()).await;
    let result = session.execute("echo hi |").await;

    assert!(matches!(result.status, CommandStatus::Rejected(_)));
    assert!(sink.text().contains("Empty command in pipeline"));
    assert!(!sink.lines().contains(&"hi".to_string()));
}

#[tokio::test]
async fn test_unterminated_quote_is_rejected() {
    let (mut session, _handle, sink) = session_with(extras()).await;
    let result = session.execute("echo \"open").await;

    assert_eq!(result.exit_code(), 1);
    assert!(sink.text().starts_with("Parse error:"));
    assert_eq!(session.history().get_history(), vec!["echo \"open"]);
}

#[tokio::test]
async fn test_failed_stage_stops_pipeline() {
    let (mut session, _handle, sink) = session_with(extras()).await;
    let result = session.execute("sleep -1 | upper").await;

    assert_eq!(result.status, CommandStatus::Exited(-1));
    assert_eq!(sink.text(), "Invalid value: -1");
}

#[tokio::test]
async fn test_nested_execution_skips_history() {
    let (mut session, _handle, sink) = session_with(extras()).await;
    let result = session.execute("twice hey").await;

    assert_eq!(result.output, Some(json!(["hey", "hey"])));
    assert_eq!(sink.lines(), vec!["hey", "hey"]);
    assert_eq!(session.history().get_history(), vec!["twice hey"]);
}

#[tokio::test]
async fn test_user_alias_expands_inside_pipeline() {
    let (mut session, _handle, _sink) = session_with(extras()).await;
    assert!(session.execute("alias shout upper").await.is_success());

    let result = session.execute("echo quiet | shout").await;
    assert_eq!(result.output, Some(json!("QUIET")));
}
