//! Dispatch: resolution, parameter binding, lifecycle and exit codes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use termcore::commands::ExecutionContext;
use termcore::{
    CommandProcessor, CommandStatus, EngineError, Parameter, ParameterType, ProcessCommand,
    ProcessorDescriptor, Result,
};

use super::session_with;

/// Emits its bound args as output.
struct ArgsEcho;

#[async_trait]
impl CommandProcessor for ArgsEcho {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let args: serde_json::Map<String, Value> = command.args.clone().into_iter().collect();
        ctx.process().output(json!({
            "path": command.path,
            "value": command.value,
            "positionals": command.positionals,
            "args": args,
        }));
        Ok(())
    }
}

fn repeat_descriptor() -> ProcessorDescriptor {
    ProcessorDescriptor::new("repeat", "Repeat a word")
        .with_parameter(Parameter::new("times", ParameterType::Integer, "How often").with_alias("n"))
        .with_parameter(Parameter::new("loud", ParameterType::Boolean, "Shout"))
        .with_parameter(
            Parameter::new("ratio", ParameterType::Number, "Scale").with_default(1),
        )
        .with_processor(ArgsEcho)
}

#[tokio::test]
async fn test_echo_hello() {
    let (mut session, _handle, sink) = session_with(vec![]).await;
    let result = session.execute("echo hello").await;

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.output, Some(json!("hello")));
    assert_eq!(sink.lines(), vec!["hello"]);
    assert_eq!(session.history().get_history(), vec!["echo hello"]);
}

#[tokio::test]
async fn test_unknown_command_is_rejected_and_recorded() {
    let (mut session, _handle, sink) = session_with(vec![]).await;
    let result = session.execute("frobnicate now").await;

    assert!(matches!(result.status, CommandStatus::Rejected(_)));
    assert_eq!(result.exit_code(), 1);
    assert_eq!(
        sink.text(),
        "Unknown command: frobnicate. Type 'help' for available commands."
    );
    assert_eq!(session.history().get_history(), vec!["frobnicate now"]);
}

#[tokio::test]
async fn test_blank_line_is_a_no_op() {
    let (mut session, _handle, sink) = session_with(vec![]).await;
    assert!(session.execute("   ").await.is_success());
    assert!(sink.lines().is_empty());
    assert!(session.history().get_history().is_empty());
}

#[tokio::test]
async fn test_parameters_are_coerced() {
    let (mut session, _handle, _sink) = session_with(vec![repeat_descriptor()]).await;
    let result = session.execute("repeat word -n 3 --loud --ratio=0.5").await;

    assert_eq!(
        result.output,
        Some(json!({
            "path": ["repeat"],
            "value": "word",
            "positionals": ["word"],
            "args": {"times": 3, "loud": true, "ratio": 0.5},
        }))
    );
}

#[tokio::test]
async fn test_boolean_parameter_with_explicit_value() {
    let (mut session, _handle, _sink) = session_with(vec![repeat_descriptor()]).await;
    let result = session.execute("REPEAT --loud=no").await;
    assert_eq!(result.output.unwrap()["args"]["loud"], json!(false));
}

#[tokio::test]
async fn test_invalid_optional_parameter_falls_back_to_default() {
    let (mut session, _handle, _sink) = session_with(vec![repeat_descriptor()]).await;
    let result = session.execute("repeat x --ratio abc --times two").await;

    assert!(result.is_success());
    let args = result.output.unwrap()["args"].clone();
    assert_eq!(args, json!({"ratio": 1}));
}

#[tokio::test]
async fn test_required_parameter_errors() {
    let descriptor = ProcessorDescriptor::new("deploy", "Deploy")
        .with_parameter(Parameter::new("replicas", ParameterType::Integer, "Count").required())
        .with_processor(ArgsEcho);
    let (mut session, _handle, sink) = session_with(vec![descriptor]).await;

    let result = session.execute("deploy").await;
    assert_eq!(
        result.status,
        CommandStatus::Rejected("Missing parameter: 'deploy' requires --replicas".into())
    );

    sink.reset();
    let result = session.execute("deploy --replicas many").await;
    assert_eq!(result.exit_code(), 1);
    assert_eq!(
        sink.text(),
        "Invalid parameter: --replicas expects integer, got 'many'"
    );

    let result = session.execute("deploy --replicas 2 --dry-run").await;
    assert_eq!(
        result.output.unwrap()["args"],
        json!({"replicas": 2, "dry-run": true})
    );
}

#[tokio::test]
async fn test_value_required() {
    let (mut session, _handle, sink) = session_with(vec![]).await;
    let result = session.execute("jwt decode").await;
    assert_eq!(result.exit_code(), 1);
    assert_eq!(sink.text(), "Missing value: 'jwt decode' requires a value");
}

#[tokio::test]
async fn test_negative_number_is_a_value() {
    let (mut session, _handle, _sink) = session_with(vec![repeat_descriptor()]).await;
    let result = session.execute("repeat -5").await;
    assert_eq!(result.output.unwrap()["value"], json!("-5"));
}

#[tokio::test]
async fn test_nested_resolution() {
    let tree = ProcessorDescriptor::new("remote", "Remotes")
        .with_alias("r")
        .with_subcommand(
            ProcessorDescriptor::new("add", "Add a remote")
                .with_processor(ArgsEcho)
                .with_subcommand(ProcessorDescriptor::new("mirror", "Mirror").with_processor(ArgsEcho)),
        );
    let (mut session, _handle, sink) = session_with(vec![tree]).await;

    let result = session.execute("r add origin").await;
    assert_eq!(result.output.as_ref().unwrap()["path"], json!(["remote", "add"]));
    assert_eq!(result.output.as_ref().unwrap()["value"], json!("origin"));

    let result = session.execute("remote ADD mirror up").await;
    assert_eq!(
        result.output.unwrap()["path"],
        json!(["remote", "add", "mirror"])
    );

    sink.reset();
    let result = session.execute("remote").await;
    assert!(result.is_success());
    assert_eq!(result.output, None);
    assert!(sink.text().starts_with("remote - Remotes"));
    assert!(sink.lines().contains(&"  add  - Add a remote".to_string()));
}

#[tokio::test]
async fn test_help_flag_shows_usage() {
    let (mut session, _handle, sink) = session_with(vec![repeat_descriptor()]).await;
    let result = session.execute("repeat --help").await;

    assert!(result.is_success());
    let text = sink.text();
    assert!(text.starts_with("repeat - Repeat a word"));
    assert!(text.contains("--times, -n <integer>"));
    assert!(text.contains("(default: 1)"));
}

#[tokio::test]
async fn test_unlisted_handler_receives_unknown_commands() {
    let catch_all = ProcessorDescriptor::new("shell", "Run anything")
        .allow_unlisted()
        .with_processor(ArgsEcho);
    let (mut session, _handle, _sink) = session_with(vec![catch_all]).await;

    let result = session.execute("ls -la /tmp").await;
    let output = result.output.unwrap();
    assert_eq!(output["path"], json!(["shell"]));
    assert_eq!(output["value"], json!("ls"));
    assert_eq!(output["positionals"], json!(["ls", "/tmp"]));
    assert_eq!(output["args"], json!({"la": true}));

    // Registered commands still win.
    let result = session.execute("echo hi").await;
    assert_eq!(result.output, Some(json!("hi")));
}

struct CountingInit {
    inits: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl CommandProcessor for CountingInit {
    async fn initialize(&self, _ctx: &mut ExecutionContext<'_>) -> Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn process_command(&self, _command: &ProcessCommand, _ctx: &mut ExecutionContext<'_>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_initialize_runs_once_per_session() {
    let inits = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));
    let descriptor = || {
        ProcessorDescriptor::new("count", "").with_processor(CountingInit {
            inits: Arc::clone(&inits),
            runs: Arc::clone(&runs),
        })
    };

    let (mut first, _h1, _s1) = session_with(vec![descriptor()]).await;
    for _ in 0..3 {
        assert!(first.execute("count").await.is_success());
    }
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 3);

    let (mut second, _h2, _s2) = session_with(vec![descriptor()]).await;
    second.execute("count").await;
    assert_eq!(inits.load(Ordering::SeqCst), 2);
}

struct FlakyInit {
    attempts: AtomicUsize,
}

#[async_trait]
impl CommandProcessor for FlakyInit {
    async fn initialize(&self, _ctx: &mut ExecutionContext<'_>) -> Result<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EngineError::command("backend not ready"));
        }
        Ok(())
    }

    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.writer().write_line("ready");
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_initialize_is_retried() {
    let descriptor = ProcessorDescriptor::new("flaky", "").with_processor(FlakyInit {
        attempts: AtomicUsize::new(0),
    });
    let (mut session, _handle, sink) = session_with(vec![descriptor]).await;

    let result = session.execute("flaky").await;
    assert_eq!(
        result.status,
        CommandStatus::Crashed("Command error: backend not ready".into())
    );
    assert!(session.execute("flaky").await.is_success());
    assert_eq!(sink.lines().last().map(String::as_str), Some("ready"));
}

struct Exiter;

#[async_trait]
impl CommandProcessor for Exiter {
    async fn process_command(&self, command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        ctx.process().output("partial");
        let code = command.value.as_deref().unwrap_or("0").parse().unwrap_or(0);
        ctx.process().exit(code)
    }
}

#[tokio::test]
async fn test_process_exit_codes() {
    let descriptor = ProcessorDescriptor::new("quit", "").with_processor(Exiter);
    let (mut session, _handle, _sink) = session_with(vec![descriptor]).await;

    let result = session.execute("quit 0").await;
    assert!(result.is_success());
    assert_eq!(result.output, Some(json!("partial")));

    let result = session.execute("quit 3").await;
    assert_eq!(result.status, CommandStatus::Exited(3));
    assert_eq!(result.exit_code(), 3);
}

struct NeedsService;

struct Greeting(String);

#[async_trait]
impl CommandProcessor for NeedsService {
    async fn process_command(&self, _command: &ProcessCommand, ctx: &mut ExecutionContext<'_>) -> Result<()> {
        let greeting = ctx
            .services()
            .get::<Greeting>()
            .ok_or_else(|| EngineError::command("no greeting service"))?;
        ctx.writer().write_line(&greeting.0);
        Ok(())
    }
}

#[tokio::test]
async fn test_services_are_reachable_from_commands() {
    let sink = termcore::io::CaptureSink::new();
    let (mut session, _handle) = termcore::EngineSession::builder()
        .output(sink.clone())
        .service(Greeting("hi there".into()))
        .build()
        .await
        .unwrap();
    session
        .register_processor(ProcessorDescriptor::new("greet", "").with_processor(NeedsService))
        .unwrap();

    assert!(session.execute("greet").await.is_success());
    assert_eq!(sink.lines(), vec!["hi there"]);
}

#[tokio::test]
async fn test_sealed_and_versioned_registration() {
    let (mut session, _handle, _sink) = session_with(vec![]).await;

    assert!(matches!(
        session.register_processor(ProcessorDescriptor::new("help", "mine")),
        Err(EngineError::SealedProcessor(_))
    ));
    assert!(matches!(
        session.register_processor(ProcessorDescriptor::new("future", "").requires_cli(">=42.0")),
        Err(EngineError::VersionIncompatible { component: "cli", .. })
    ));
    assert!(session
        .register_processor(ProcessorDescriptor::new("present", "").requires_core("0.1.0"))
        .is_ok());
}
