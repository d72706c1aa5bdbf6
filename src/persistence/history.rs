//! Command history persistence.
//!
//! Records submitted command lines in order and writes the whole list to the
//! backend after every change.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{load, save, PersistenceBackend};
use crate::error::Result;

/// Backend key holding the history list.
pub const HISTORY_KEY: &str = "history";

/// Ordered log of submitted command lines.
///
/// Entries are trimmed and non-empty, and no two consecutive entries are
/// equal. The list only grows, except through [`clear_history`](Self::clear_history).
pub struct CommandHistory {
    entries: Vec<String>,
    backend: Arc<dyn PersistenceBackend>,
}

impl CommandHistory {
    /// Loads the history stored in `backend`.
    ///
    /// A malformed stored value is logged and treated as empty.
    pub async fn load(backend: Arc<dyn PersistenceBackend>) -> Result<Self> {
        let entries = match load::<Vec<String>>(backend.as_ref(), HISTORY_KEY).await {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring stored history: {e}");
                Vec::new()
            }
        };
        debug!(entries = entries.len(), "Command history loaded");
        Ok(Self { entries, backend })
    }

    /// Appends a command line.
    ///
    /// Returns false without touching the backend when the trimmed text is
    /// empty or equals the newest entry.
    pub async fn add_command(&mut self, text: &str) -> Result<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        if self.entries.last().map(String::as_str) == Some(text) {
            return Ok(false);
        }

        self.entries.push(text.to_string());
        self.persist().await?;
        Ok(true)
    }

    /// Returns a copy of all entries, oldest first.
    pub fn get_history(&self) -> Vec<String> {
        self.entries.clone()
    }

    pub fn get_command(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// One past the newest entry; the starting point for a history cursor.
    pub fn get_last_index(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub async fn clear_history(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        save(self.backend.as_ref(), HISTORY_KEY, &self.entries).await
    }
}

impl std::fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHistory")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
