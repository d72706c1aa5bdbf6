//! Tokenizer for command lines.
//!
//! Provides quote-aware splitting of a raw input line with support for:
//! - Quoted strings (single and double quotes), quotes stripped
//! - Escaped quote characters within quotes
//! - Long flags (`--flag`, `--flag=value`)
//! - Short/alias flags (`-f`, `-alias=value`)
//! - The pipe operator (`|`) outside of quotes
//!
//! Every token carries the byte span it occupied in the input so callers can
//! recover the verbatim source text (quotes included).

use std::iter::Peekable;
use std::str::CharIndices;

/// A token parsed from command input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain word or quoted span (quotes removed).
    Word(String),
    /// A long flag (`--flag` or `--flag=value`).
    LongFlag { name: String, value: Option<String> },
    /// A short or alias flag (`-f` or `-alias=value`).
    ShortFlag { name: String, value: Option<String> },
    /// An unquoted `|`.
    Pipe,
}

impl Token {
    /// Returns the token as a word if it is one.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag name and inline value if this is a flag of either form.
    pub fn as_flag(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Token::LongFlag { name, value } | Token::ShortFlag { name, value } => {
                Some((name, value.as_deref()))
            }
            _ => None,
        }
    }

    /// Returns true if this is a long flag with the given name.
    pub fn is_long_flag(&self, flag: &str) -> bool {
        matches!(self, Token::LongFlag { name, .. } if name == flag)
    }
}

/// A token together with the byte range it covers in the source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Tokenizes a command line.
///
/// Handles:
/// - Whitespace-separated tokens
/// - Double-quoted strings: `"hello  world"` → `hello  world`
/// - Single-quoted strings: `'hello world'` → `hello world`
/// - Escaped quotes: `"say \"hi\""` → `say "hi"`
/// - Long flags: `--count=5` → LongFlag { name: "count", value: Some("5") }
/// - Alias flags: `-c` → ShortFlag { name: "c", value: None }
/// - Negative numbers stay words: `-5` → Word("-5")
///
/// Fails with a [`ParseError`] when a quote is never closed.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '|' {
            chars.next();
            tokens.push(Spanned {
                token: Token::Pipe,
                start: pos,
                end: pos + 1,
            });
            continue;
        }

        let word = collect_word(input, &mut chars)?;
        tokens.push(Spanned {
            token: classify(&word),
            start: word.start,
            end: word.end,
        });
    }

    Ok(tokens)
}

/// A word as collected from the input, before flag classification.
struct RawWord {
    text: String,
    starts_quoted: bool,
    start: usize,
    end: usize,
}

/// Collects one word, joining adjacent quoted and unquoted segments.
fn collect_word(input: &str, chars: &mut Peekable<CharIndices<'_>>) -> Result<RawWord, ParseError> {
    let mut word = RawWord {
        text: String::new(),
        starts_quoted: false,
        start: chars.peek().map(|&(pos, _)| pos).unwrap_or(input.len()),
        end: input.len(),
    };

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() || c == '|' {
            word.end = pos;
            return Ok(word);
        }

        chars.next();
        if c == '"' || c == '\'' {
            if pos == word.start {
                word.starts_quoted = true;
            }
            let quoted = collect_quoted(input, chars, c, pos)?;
            word.text.push_str(&quoted);
            continue;
        }

        word.text.push(c);
    }

    word.end = input.len();
    Ok(word)
}

/// Collects characters inside quotes, handling escaped quotes and backslashes.
fn collect_quoted(
    input: &str,
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
    opened_at: usize,
) -> Result<String, ParseError> {
    let mut result = String::new();
    let mut escaped = false;

    for (_, c) in chars.by_ref() {
        if escaped {
            if c != quote && c != '\\' {
                // Unknown escape, keep as-is
                result.push('\\');
            }
            result.push(c);
            escaped = false;
            continue;
        }

        if c == '\\' {
            escaped = true;
            continue;
        }

        if c == quote {
            return Ok(result);
        }

        result.push(c);
    }

    Err(
        ParseError::new(input, format!("Unterminated {} quote", quote))
            .at(opened_at)
            .with_hint(format!("Close the quote opened at column {}", opened_at + 1)),
    )
}

/// Turns a raw word into a word or flag token.
fn classify(word: &RawWord) -> Token {
    let text = &word.text;
    if word.starts_quoted {
        return Token::Word(text.clone());
    }

    if let Some(body) = text.strip_prefix("--") {
        if let Some((name, value)) = split_flag(body) {
            return Token::LongFlag { name, value };
        }
        return Token::Word(text.clone());
    }

    if let Some(body) = text.strip_prefix('-') {
        let looks_numeric = body
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '.')
            .unwrap_or(true);
        if !looks_numeric {
            if let Some((name, value)) = split_flag(body) {
                return Token::ShortFlag { name, value };
            }
        }
    }

    Token::Word(text.clone())
}

/// Splits `name=value` into its parts; returns None for an empty name.
fn split_flag(body: &str) -> Option<(String, Option<String>)> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value.to_string())),
        None => (body, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value))
}

/// Parse error with context for helpful error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The input that failed to parse.
    pub input: String,
    /// Error message describing what went wrong.
    pub message: String,
    /// Byte offset of the offending character, when known.
    pub position: Option<usize>,
    /// Optional hint for how to fix the error.
    pub hint: Option<String>,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
            position: None,
            hint: None,
        }
    }

    /// Records the position of the offending character.
    pub fn at(self, position: usize) -> Self {
        Self {
            position: Some(position),
            ..self
        }
    }

    /// Adds a hint to the error.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..self
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.input, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\nHint: {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
