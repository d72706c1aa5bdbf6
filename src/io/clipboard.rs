//! Clipboard support.
//!
//! Commands reach the clipboard through the [`Clipboard`] capability so the
//! host decides what "the clipboard" is. The native implementation uses
//! arboard and falls back to the OSC 52 escape sequence, which most modern
//! terminals turn into a copy.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Read/write access to a clipboard.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write(&self, text: &str) -> Result<()>;
    async fn read(&self) -> Result<String>;
}

/// Detected clipboard backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardBackend {
    /// Native clipboard via arboard.
    Arboard,
    /// Terminal OSC 52 escape sequence (write only).
    Osc52,
}

/// The platform clipboard, with OSC 52 as a fallback.
pub struct SystemClipboard {
    native: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    /// Connects to the native clipboard if one is available.
    pub fn new() -> Self {
        let native = match arboard::Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                debug!(error = %e, "Native clipboard unavailable, using OSC 52");
                None
            }
        };
        Self {
            native: Mutex::new(native),
        }
    }

    pub fn backend(&self) -> ClipboardBackend {
        let guard = self.native.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            ClipboardBackend::Arboard
        } else {
            ClipboardBackend::Osc52
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("backend", &self.backend())
            .finish()
    }
}

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn write(&self, text: &str) -> Result<()> {
        {
            let mut guard = self.native.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(clipboard) = guard.as_mut() {
                return clipboard
                    .set_text(text)
                    .map_err(|e| EngineError::clipboard(format!("Failed to copy: {e}")));
            }
        }
        copy_osc52(text)
    }

    async fn read(&self) -> Result<String> {
        let mut guard = self.native.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(clipboard) => clipboard
                .get_text()
                .map_err(|e| EngineError::clipboard(format!("Failed to paste: {e}"))),
            None => Err(EngineError::clipboard(
                "OSC 52 paste not supported; use terminal paste",
            )),
        }
    }
}

/// Builds the OSC 52 sequence that asks the terminal to copy `text`.
pub fn osc52_sequence(text: &str) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};

    // ESC ] 52 ; c ; <base64-data> ESC \
    format!("\x1b]52;c;{}\x1b\\", STANDARD.encode(text))
}

fn copy_osc52(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(osc52_sequence(text).as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| EngineError::clipboard(format!("Failed to write OSC 52: {e}")))
}

/// In-memory clipboard. Clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write(&self, text: &str) -> Result<()> {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = text.to_string();
        Ok(())
    }

    async fn read(&self) -> Result<String> {
        Ok(self.contents())
    }
}
