//! Interactive input.
//!
//! The host pushes key events through an [`InputHandle`]; the session owns
//! the matching [`InputReader`]. Commands suspend on a [`Reader`] prompt until
//! the user commits a value or cancels with Escape or Ctrl+C, in which case
//! the read resolves to `None` and the session's abort signal fires.

pub mod editor;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::io::OutputSink;
use editor::{HistoryCursor, LineEditor};

/// A key event delivered by the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Up,
    Down,
    Enter,
    Tab,
    Escape,
    CtrlC,
}

impl Key {
    /// Returns true for keys that cancel an interactive read.
    pub fn is_cancel(&self) -> bool {
        matches!(self, Key::Escape | Key::CtrlC)
    }
}

/// Holder for the session's current abort signal.
///
/// A fresh token is installed before every dispatched command and before
/// the session's command-line prompt. Prompts issued by a running command
/// share that command's token.
#[derive(Debug, Clone, Default)]
struct AbortSlot(Arc<Mutex<CancellationToken>>);

impl AbortSlot {
    fn current(&self) -> CancellationToken {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn install(&self, token: CancellationToken) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn renew(&self) -> CancellationToken {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = CancellationToken::new();
        guard.clone()
    }
}

/// Host-side handle for feeding input to a session.
#[derive(Debug, Clone)]
pub struct InputHandle {
    keys: UnboundedSender<Key>,
    abort: AbortSlot,
}

impl InputHandle {
    /// Queues one key. Returns false if the session is gone.
    pub fn send_key(&self, key: Key) -> bool {
        self.keys.send(key).is_ok()
    }

    /// Queues every character of `text` followed by Enter.
    pub fn send_text(&self, text: &str) -> bool {
        text.chars().all(|c| self.send_key(Key::Char(c))) && self.send_key(Key::Enter)
    }

    /// Fires the current abort signal without queuing a key.
    pub fn interrupt(&self) {
        debug!("Interrupt requested");
        self.abort.current().cancel();
    }

    /// Returns an interrupt-only handle that does not keep the input open.
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            abort: self.abort.clone(),
        }
    }
}

/// Fires a session's abort signal. Unlike [`InputHandle`], holding one does
/// not keep the key channel open.
#[derive(Debug, Clone)]
pub struct Interrupter {
    abort: AbortSlot,
}

impl Interrupter {
    pub fn interrupt(&self) {
        debug!("Interrupt requested");
        self.abort.current().cancel();
    }
}

/// Session-side receiver of key events.
#[derive(Debug)]
pub struct InputReader {
    keys: UnboundedReceiver<Key>,
    abort: AbortSlot,
    echo: bool,
    closed: bool,
}

/// Creates a connected handle/reader pair.
pub fn channel() -> (InputHandle, InputReader) {
    let (tx, rx) = unbounded_channel();
    let abort = AbortSlot::default();
    (
        InputHandle {
            keys: tx,
            abort: abort.clone(),
        },
        InputReader {
            keys: rx,
            abort,
            echo: true,
            closed: false,
        },
    )
}

impl InputReader {
    /// Enables or disables echoing typed characters to the output.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    /// True once the host dropped every [`InputHandle`] and the queue is empty.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// The abort signal of the operation in flight.
    pub fn abort_signal(&self) -> CancellationToken {
        self.abort.current()
    }

    /// Installs and returns a fresh abort signal.
    ///
    /// Keys already queued are type-ahead and stay queued, cancel keys
    /// included.
    pub fn renew_abort(&self) -> CancellationToken {
        self.abort.renew()
    }

    /// Puts back a previously issued abort signal.
    pub fn restore_abort(&self, token: CancellationToken) {
        self.abort.install(token);
    }

    /// Waits for the next key.
    ///
    /// Returns None when the abort signal fires, when a cancel key arrives
    /// (which also fires the signal), or when the input is closed.
    pub async fn next_key(&mut self) -> Option<Key> {
        let token = self.abort.current();
        if token.is_cancelled() {
            return None;
        }

        let key = tokio::select! {
            _ = token.cancelled() => return None,
            key = self.keys.recv() => key,
        };

        match key {
            Some(key) if key.is_cancel() => {
                debug!(?key, "Read cancelled by user");
                token.cancel();
                None
            }
            Some(key) => Some(key),
            None => {
                self.closed = true;
                None
            }
        }
    }
}

/// One choice offered by [`Reader::read_select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Completion source for command-line reads.
///
/// Must be `Sync`: prompts hold it across awaits inside `Send` futures.
pub type Completer<'c> = &'c (dyn Fn(&str) -> Vec<String> + Sync);

/// Prompts the user through the session's input and output.
///
/// All reads return `None` on cancellation; callers treat that as a
/// request to stop the command.
pub struct Reader<'a> {
    input: &'a mut InputReader,
    output: &'a mut dyn OutputSink,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a mut InputReader, output: &'a mut dyn OutputSink) -> Self {
        Self { input, output }
    }

    /// Reads a line of text.
    pub async fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.read_text(prompt, LineEditor::new(), None, None).await
    }

    /// Reads a line of text, echoing `*` for each character.
    pub async fn read_password(&mut self, prompt: &str) -> Option<String> {
        self.read_text(prompt, LineEditor::masked('*'), None, None)
            .await
    }

    /// Reads a command line with history navigation and completion.
    pub async fn read_command_line(
        &mut self,
        prompt: &str,
        history: &mut HistoryCursor,
        completer: Option<Completer<'_>>,
    ) -> Option<String> {
        self.read_text(prompt, LineEditor::new(), Some(history), completer)
            .await
    }

    /// Asks a yes/no question. `y`/`n` pick an answer, Enter commits it;
    /// Enter alone yields `default` (false when omitted).
    pub async fn read_confirm(&mut self, prompt: &str, default: Option<bool>) -> Option<bool> {
        let hint = match default {
            Some(true) => "[Y/n]",
            _ => "[y/N]",
        };
        self.output.write(&format!("{prompt} {hint} "));

        let mut choice: Option<bool> = None;
        loop {
            let Some(key) = self.input.next_key().await else {
                self.output.write_line("");
                return None;
            };
            match key {
                Key::Char(c) if matches!(c, 'y' | 'Y' | 'n' | 'N') => {
                    if choice.is_some() {
                        self.echo("\x08");
                    }
                    choice = Some(c.eq_ignore_ascii_case(&'y'));
                    self.echo(&c.to_string());
                }
                Key::Backspace if choice.is_some() => {
                    choice = None;
                    self.echo("\x08 \x08");
                }
                Key::Enter => {
                    self.end_line();
                    return Some(choice.unwrap_or(default.unwrap_or(false)));
                }
                _ => {}
            }
        }
    }

    /// Lets the user pick one of `options` with Up/Down (wrapping) or a
    /// digit, committing with Enter. Returns the chosen option's value.
    pub async fn read_select(&mut self, prompt: &str, options: &[SelectOption]) -> Option<String> {
        if options.is_empty() {
            return None;
        }

        self.output.write_line(prompt);
        let mut selected = 0usize;
        self.render_options(options, selected);

        loop {
            let key = self.input.next_key().await?;
            let next = match key {
                Key::Up => (selected + options.len() - 1) % options.len(),
                Key::Down | Key::Tab => (selected + 1) % options.len(),
                Key::Char(c) => match c.to_digit(10) {
                    Some(d) if d >= 1 && (d as usize) <= options.len() => d as usize - 1,
                    _ => continue,
                },
                Key::Enter => return Some(options[selected].value.clone()),
                _ => continue,
            };
            if next != selected {
                selected = next;
                self.output.write(&format!("\x1b[{}A", options.len()));
                self.render_options(options, selected);
            }
        }
    }

    fn render_options(&mut self, options: &[SelectOption], selected: usize) {
        for (i, option) in options.iter().enumerate() {
            let marker = if i == selected { ">" } else { " " };
            self.output
                .write_line(&format!("\r\x1b[K{marker} {}", option.label));
        }
    }

    async fn read_text(
        &mut self,
        prompt: &str,
        mut editor: LineEditor,
        mut history: Option<&mut HistoryCursor>,
        completer: Option<Completer<'_>>,
    ) -> Option<String> {
        self.output.write(prompt);

        loop {
            let Some(key) = self.input.next_key().await else {
                self.output.write_line("");
                return None;
            };
            let echo = match key {
                Key::Char(c) => editor.insert(c),
                Key::Backspace => editor.backspace(),
                Key::Delete => editor.delete(),
                Key::Left => editor.left(),
                Key::Right => editor.right(),
                Key::Home => editor.home(),
                Key::End => editor.end(),
                Key::Up => match history.as_deref_mut() {
                    Some(cursor) => {
                        let current = editor.text();
                        match cursor.previous(&current).map(str::to_string) {
                            Some(entry) => editor.replace(&entry),
                            None => String::new(),
                        }
                    }
                    None => String::new(),
                },
                Key::Down => match history.as_deref_mut() {
                    Some(cursor) => match cursor.next().map(str::to_string) {
                        Some(entry) => editor.replace(&entry),
                        None => String::new(),
                    },
                    None => String::new(),
                },
                Key::Tab => match completer {
                    Some(complete) => complete_line(&mut editor, complete),
                    None => String::new(),
                },
                Key::Enter => {
                    self.end_line();
                    return Some(editor.text());
                }
                Key::Escape | Key::CtrlC => String::new(),
            };
            self.echo(&echo);
        }
    }

    fn echo(&mut self, text: &str) {
        if self.input.echo && !text.is_empty() {
            self.output.write(text);
        }
    }

    fn end_line(&mut self) {
        if self.input.echo {
            self.output.write_line("");
        }
    }
}

/// Completes the first word when exactly one candidate matches.
fn complete_line(editor: &mut LineEditor, complete: Completer<'_>) -> String {
    let text = editor.text();
    if text.contains(char::is_whitespace) {
        return String::new();
    }
    match complete(&text).as_slice() {
        [only] => editor.replace(&format!("{only} ")),
        _ => String::new(),
    }
}
