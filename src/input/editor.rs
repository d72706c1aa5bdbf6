//! Line editing and history navigation for interactive reads.
//!
//! [`LineEditor`] keeps the buffer and cursor and returns, for every edit,
//! the terminal output that brings the screen in line with the buffer. It
//! never writes anything itself.

/// Editable single-line buffer with a cursor.
#[derive(Debug, Default, Clone)]
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    mask: Option<char>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an editor that echoes `mask` instead of the typed characters.
    pub fn masked(mask: char) -> Self {
        Self {
            mask: Some(mask),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Inserts a character at the cursor.
    pub fn insert(&mut self, c: char) -> String {
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
        let tail = self.shown(self.cursor);
        let tail_len = tail.chars().count();
        format!("{}{}{}", self.shown_char(c), tail, back(tail_len))
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) -> String {
        if self.cursor == 0 {
            return String::new();
        }
        self.cursor -= 1;
        self.buffer.remove(self.cursor);
        let tail = self.shown(self.cursor);
        format!("\x08{} {}", tail, back(tail.chars().count() + 1))
    }

    /// Deletes the character under the cursor.
    pub fn delete(&mut self) -> String {
        if self.cursor >= self.buffer.len() {
            return String::new();
        }
        self.buffer.remove(self.cursor);
        let tail = self.shown(self.cursor);
        format!("{} {}", tail, back(tail.chars().count() + 1))
    }

    pub fn left(&mut self) -> String {
        if self.cursor == 0 {
            return String::new();
        }
        self.cursor -= 1;
        back(1)
    }

    pub fn right(&mut self) -> String {
        if self.cursor >= self.buffer.len() {
            return String::new();
        }
        self.cursor += 1;
        forward(1)
    }

    pub fn home(&mut self) -> String {
        let moved = back(self.cursor);
        self.cursor = 0;
        moved
    }

    pub fn end(&mut self) -> String {
        let moved = forward(self.buffer.len() - self.cursor);
        self.cursor = self.buffer.len();
        moved
    }

    /// Replaces the whole buffer, leaving the cursor at the end.
    pub fn replace(&mut self, text: &str) -> String {
        let moved = back(self.cursor);
        self.buffer = text.chars().collect();
        self.cursor = self.buffer.len();
        format!("{}\x1b[K{}", moved, self.shown(0))
    }

    fn shown(&self, from: usize) -> String {
        match self.mask {
            Some(mask) => std::iter::repeat(mask).take(self.buffer.len() - from).collect(),
            None => self.buffer[from..].iter().collect(),
        }
    }

    fn shown_char(&self, c: char) -> char {
        self.mask.unwrap_or(c)
    }
}

fn back(n: usize) -> String {
    if n == 0 {
        String::new()
    } else {
        format!("\x1b[{n}D")
    }
}

fn forward(n: usize) -> String {
    if n == 0 {
        String::new()
    } else {
        format!("\x1b[{n}C")
    }
}

/// Up/down navigation over a snapshot of the command history.
///
/// The cursor starts one past the newest entry. Whatever was being typed
/// when navigation started is kept as a draft and restored when moving
/// back past the newest entry.
#[derive(Debug, Default)]
pub struct HistoryCursor {
    entries: Vec<String>,
    position: usize,
    draft: String,
}

impl HistoryCursor {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            position: entries.len(),
            entries,
            draft: String::new(),
        }
    }

    /// Moves to the previous (older) entry.
    /// Returns None if already at the oldest entry.
    pub fn previous(&mut self, current_input: &str) -> Option<&str> {
        if self.position == 0 {
            return None;
        }
        if self.position == self.entries.len() {
            self.draft = current_input.to_string();
        }
        self.position -= 1;
        self.entries.get(self.position).map(String::as_str)
    }

    /// Moves to the next (newer) entry, or back to the draft.
    /// Returns None if already at the draft position.
    pub fn next(&mut self) -> Option<&str> {
        if self.position >= self.entries.len() {
            return None;
        }
        self.position += 1;
        if self.position == self.entries.len() {
            Some(self.draft.as_str())
        } else {
            self.entries.get(self.position).map(String::as_str)
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
