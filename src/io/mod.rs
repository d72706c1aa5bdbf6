//! Output side of the terminal boundary.
//!
//! The engine never renders anything itself: it writes text to an
//! [`OutputSink`] supplied by the host (a web terminal widget, stdout, or a
//! capture buffer in tests). [`Writer`] adds the formatted helpers commands
//! use on top of a sink.

pub mod clipboard;

use std::io::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Line-output sink provided by the terminal collaborator.
pub trait OutputSink: Send {
    /// Writes text followed by a line break.
    fn write_line(&mut self, text: &str);
    /// Writes text without a trailing line break.
    fn write(&mut self, text: &str);
    /// Clears the visible output.
    fn clear(&mut self);
}

/// Formatting helpers over an [`OutputSink`].
pub struct Writer<'a> {
    sink: &'a mut dyn OutputSink,
}

impl<'a> Writer<'a> {
    pub fn new(sink: &'a mut dyn OutputSink) -> Self {
        Self { sink }
    }

    pub fn write(&mut self, text: &str) {
        self.sink.write(text);
    }

    pub fn write_line(&mut self, text: &str) {
        self.sink.write_line(text);
    }

    pub fn clear(&mut self) {
        self.sink.clear();
    }

    pub fn write_error(&mut self, text: &str) {
        self.sink.write_line(&format!("{RED}{text}{RESET}"));
    }

    pub fn write_success(&mut self, text: &str) {
        self.sink.write_line(&format!("{GREEN}{text}{RESET}"));
    }

    pub fn write_warning(&mut self, text: &str) {
        self.sink.write_line(&format!("{YELLOW}{text}{RESET}"));
    }

    pub fn write_info(&mut self, text: &str) {
        self.sink.write_line(&format!("{CYAN}{text}{RESET}"));
    }

    /// Pretty-prints a JSON value, one output line per text line.
    pub fn write_json(&mut self, value: &Value) {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        for line in text.lines() {
            self.sink.write_line(line);
        }
    }

    /// Writes rows as left-aligned columns under a header.
    pub fn write_table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let format_row = |cells: Vec<&str>| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        self.sink.write_line(&format_row(headers.to_vec()));
        self.sink.write_line(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in rows {
            self.sink
                .write_line(&format_row(row.iter().map(String::as_str).collect()));
        }
    }
}

/// Writes to the process's standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&mut self, text: &str) {
        println!("{text}");
    }

    fn write(&mut self, text: &str) {
        print!("{text}");
        let _ = std::io::stdout().flush();
    }

    fn clear(&mut self) {
        // Clear screen and home the cursor.
        print!("\x1b[2J\x1b[H");
        let _ = std::io::stdout().flush();
    }
}

/// In-memory sink that records completed lines.
///
/// Clones share the same buffer, so a test can keep one handle while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    inner: Arc<Mutex<CaptureBuffer>>,
}

#[derive(Debug, Default)]
struct CaptureBuffer {
    lines: Vec<String>,
    pending: String,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed lines, plus any pending partial line.
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut lines = buffer.lines.clone();
        if !buffer.pending.is_empty() {
            lines.push(buffer.pending.clone());
        }
        lines
    }

    /// All output joined with newlines, ANSI colour codes removed.
    pub fn text(&self) -> String {
        strip_ansi(&self.lines().join("\n"))
    }

    /// Drops everything captured so far.
    pub fn reset(&self) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.lines.clear();
        buffer.pending.clear();
    }
}

impl OutputSink for CaptureSink {
    fn write_line(&mut self, text: &str) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let line = std::mem::take(&mut buffer.pending) + text;
        buffer.lines.push(line);
    }

    fn write(&mut self, text: &str) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.pending.push_str(text);
    }

    fn clear(&mut self) {
        self.reset();
    }
}

/// Removes ANSI escape sequences (CSI and OSC) from text.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == '\x07' || (c == '\x1b' && chars.next_if_eq(&'\\').is_some()) {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    out
}
