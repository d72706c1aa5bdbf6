//! Helpers for running the termcore binary.

use std::io::Write;
use std::process::{Command, Stdio};

/// Runs termcore with in-memory storage and the given arguments, feeding
/// `stdin` to it. Returns (exit code, stdout, stderr).
pub fn run_termcore(args: &[&str], stdin: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_termcore"))
        .arg("--memory")
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start termcore");

    if let Some(mut input) = child.stdin.take() {
        input
            .write_all(stdin.as_bytes())
            .expect("Failed to write stdin");
    }
    let output = child.wait_with_output().expect("Failed to wait for termcore");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (exit_code, stdout, stderr)
}

/// Runs one line in one-shot mode.
pub fn run_line(line: &str) -> (i32, String, String) {
    run_termcore(&["-e", line], "")
}
