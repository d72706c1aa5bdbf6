//! Binary behaviour in one-shot and REPL mode.

use super::common::{run_line, run_termcore};

#[test]
fn test_echo_exits_zero() {
    let (code, stdout, _) = run_line("echo hello");
    assert_eq!(code, 0);
    assert_eq!(stdout, "hello\n");
}

#[test]
fn test_exit_code_is_propagated() {
    let (code, stdout, _) = run_line("unalias missing");
    assert_eq!(code, -1i32 & 0xff);
    assert!(stdout.contains("Alias missing not found"));
}

#[test]
fn test_rejected_command_exits_one() {
    let (code, stdout, _) = run_line("nosuchcommand");
    assert_eq!(code, 1);
    assert!(stdout.contains("Unknown command: nosuchcommand"));
}

#[test]
fn test_malformed_jwt() {
    let (code, stdout, _) = run_line("jwt decode abc");
    assert_ne!(code, 0);
    assert!(stdout.contains("Invalid JWT token (expected 3 parts separated by dots)"));
}

#[test]
fn test_no_builtins() {
    let (code, _, _) = run_termcore(&["--no-builtins", "-e", "echo hi"], "");
    assert_eq!(code, 1);
}

#[test]
fn test_repl_runs_stdin_lines_until_eof() {
    let (code, stdout, _) = run_termcore(&["--prompt", "> "], "echo one\necho two | echo\n");
    assert_eq!(code, 0);
    assert!(stdout.contains("one\n"));
    assert_eq!(stdout.matches("two").count(), 2);
    assert!(stdout.starts_with("> "));
}
