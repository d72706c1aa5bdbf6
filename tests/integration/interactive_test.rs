//! Interactive input: prompts from commands and the session's command line.

use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use termcore::commands::ExecutionContext;
use termcore::input::SelectOption;
use termcore::{CommandProcessor, CommandStatus, Key, ProcessCommand, ProcessorDescriptor, Result};

use super::session_with;

/// Asks for a name, a confirmation and a colour.
struct Survey;

#[async_trait]
impl CommandProcessor for Survey {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let mut reader = ctx.reader();
        let Some(name) = reader.read_line("Name: ").await else {
            return Ok(());
        };
        let Some(confirmed) = reader.read_confirm("Continue?", Some(false)).await else {
            return Ok(());
        };
        let options = [
            SelectOption::new("Red", "red"),
            SelectOption::new("Green", "green"),
            SelectOption::new("Blue", "blue"),
        ];
        let Some(color) = reader.read_select("Pick a colour", &options).await else {
            return Ok(());
        };
        ctx.process()
            .output(json!({"name": name, "confirmed": confirmed, "color": color}));
        Ok(())
    }
}

struct Login;

#[async_trait]
impl CommandProcessor for Login {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if let Some(secret) = ctx.reader().read_password("Password: ").await {
            ctx.process().output(secret);
        }
        Ok(())
    }
}

/// Runs a nested command, then prompts.
struct EchoThenAsk;

#[async_trait]
impl CommandProcessor for EchoThenAsk {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.execute("echo inner").await;
        let answer = ctx.reader().read_line("Next: ").await;
        let aborted = ctx.is_aborted();
        ctx.writer().write_line(&format!("answer={answer:?} aborted={aborted}"));
        Ok(())
    }
}

fn extras() -> Vec<ProcessorDescriptor> {
    vec![
        ProcessorDescriptor::new("survey", "Ask questions").with_processor(Survey),
        ProcessorDescriptor::new("login", "Ask for a password").with_processor(Login),
        ProcessorDescriptor::new("chain", "Echo, then ask").with_processor(EchoThenAsk),
    ]
}

#[tokio::test]
async fn test_prompts_read_queued_keys() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    handle.send_text("Ada");
    handle.send_key(Key::Char('y'));
    handle.send_key(Key::Enter);
    handle.send_key(Key::Down);
    handle.send_key(Key::Down);
    handle.send_key(Key::Enter);

    let result = session.execute("survey").await;
    assert!(result.is_success());
    assert_eq!(
        result.output,
        Some(json!({"name": "Ada", "confirmed": true, "color": "blue"}))
    );
}

#[tokio::test]
async fn test_confirm_default_and_select_wraparound() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    handle.send_text("Bob");
    handle.send_key(Key::Enter);
    handle.send_key(Key::Up);
    handle.send_key(Key::Enter);

    let result = session.execute("survey").await;
    assert_eq!(
        result.output,
        Some(json!({"name": "Bob", "confirmed": false, "color": "blue"}))
    );
}

#[tokio::test]
async fn test_line_editing_keys() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    for key in [
        Key::Char('a'),
        Key::Char('c'),
        Key::Left,
        Key::Char('b'),
        Key::End,
        Key::Char('x'),
        Key::Backspace,
        Key::Home,
        Key::Delete,
        Key::Enter,
    ] {
        handle.send_key(key);
    }
    handle.send_key(Key::Char('n'));
    handle.send_key(Key::Enter);
    handle.send_key(Key::Enter);

    let result = session.execute("survey").await;
    assert_eq!(result.output.unwrap()["name"], json!("bc"));
}

#[tokio::test]
async fn test_password_is_masked() {
    let (mut session, handle, sink) = session_with(extras()).await;
    handle.send_text("abcd");

    let result = session.execute("login").await;
    assert_eq!(result.output, Some(json!("abcd")));
    assert_eq!(sink.lines(), vec!["Password: ****"]);
}

#[tokio::test]
async fn test_cancel_key_aborts_command() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    handle.send_key(Key::Char('A'));
    handle.send_key(Key::CtrlC);

    let result = session.execute("survey").await;
    assert_eq!(result.status, CommandStatus::Aborted);
    assert_eq!(result.exit_code(), 130);

    // The next command gets a fresh abort signal.
    handle.send_text("Cy");
    handle.send_key(Key::Enter);
    handle.send_key(Key::Escape);
    let result = session.execute("survey").await;
    assert_eq!(result.status, CommandStatus::Aborted);
}

#[tokio::test]
async fn test_cancel_after_nested_execute_aborts_outer_command() {
    let (mut session, handle, sink) = session_with(extras()).await;
    handle.send_key(Key::Char('a'));
    handle.send_key(Key::CtrlC);

    let result = session.execute("chain").await;
    assert_eq!(result.status, CommandStatus::Aborted);
    let lines = sink.lines();
    assert!(lines.contains(&"inner".to_string()));
    assert!(lines.contains(&"answer=None aborted=true".to_string()));
}

#[tokio::test]
async fn test_host_interrupt_after_nested_execute_reaches_outer_command() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    let interrupter = handle.interrupter();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        interrupter.interrupt();
    });

    let result = session.execute("chain").await;
    assert_eq!(result.status, CommandStatus::Aborted);
    drop(handle);
}

#[tokio::test]
async fn test_host_interrupt_aborts_waiting_prompt() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    let interrupter = handle.interrupter();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        interrupter.interrupt();
    });

    let result = session.execute("login").await;
    assert_eq!(result.status, CommandStatus::Aborted);
    drop(handle);
}

#[tokio::test]
async fn test_command_line_history_navigation() {
    let (mut session, handle, sink) = session_with(extras()).await;
    handle.send_text("echo first");
    handle.send_key(Key::Up);
    handle.send_key(Key::Enter);
    drop(handle);

    assert_eq!(session.run().await, 0);
    let repeats = sink.lines().iter().filter(|l| l.as_str() == "first").count();
    assert_eq!(repeats, 2);
    assert_eq!(session.history().get_history(), vec!["echo first"]);
}

#[tokio::test]
async fn test_command_line_tab_completion() {
    let (mut session, handle, sink) = session_with(extras()).await;
    handle.send_key(Key::Char('e'));
    handle.send_key(Key::Char('c'));
    handle.send_key(Key::Tab);
    handle.send_text("yo");
    drop(handle);

    session.run().await;
    assert_eq!(session.history().get_history(), vec!["echo yo"]);
    assert!(sink.lines().contains(&"yo".to_string()));
}

#[tokio::test]
async fn test_interrupter_does_not_hold_input_open() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    let interrupter = handle.interrupter();
    drop(handle);

    let code = tokio::time::timeout(Duration::from_secs(5), session.run())
        .await
        .unwrap();
    assert_eq!(code, 0);
    interrupter.interrupt();
}

#[tokio::test]
async fn test_run_reports_last_exit_code() {
    let (mut session, handle, _sink) = session_with(extras()).await;
    handle.send_text("echo ok");
    handle.send_text("sleep -1");
    drop(handle);

    assert_eq!(session.run().await, -1);
}
