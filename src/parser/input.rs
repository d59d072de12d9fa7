//! Shared low-level input handling for the XML and HTML parsers.
//!
//! [`ParserInput`] wraps the source text with position tracking (line,
//! column, byte offset), lookahead and consumption primitives, name
//! scanning, nesting-depth accounting and the diagnostics list. Both parsers
//! compose it instead of reimplementing cursor handling.
//!
//! Nothing here fails. The parsers are recovering parsers: problems are
//! recorded with [`ParserInput::push_diagnostic`] and parsing continues.

use std::borrow::Cow;

use crate::error::{ErrorSeverity, ParseDiagnostic, SourceLocation};

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 256;

// -------------------------------------------------------------------------
// Name character classes (XML 1.0 §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar`.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Splits a qualified name into optional prefix and local part.
///
/// `"svg:rect"` gives `(Some("svg"), "rect")`, `"rect"` gives `(None, "rect")`.
/// A leading or trailing colon is not treated as a separator.
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (Some(prefix), local),
        _ => (None, name),
    }
}

/// Replaces `\r\n` and lone `\r` with `\n`, as both XML and HTML parsers do
/// before tokenizing.
pub(crate) fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
}

// -------------------------------------------------------------------------
// Position checkpointing
// -------------------------------------------------------------------------

/// A snapshot of the cursor, restored with [`ParserInput::restore_position`]
/// when a speculative scan has to back out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SavedPosition {
    pos: usize,
    line: u32,
    column: u32,
}

// -------------------------------------------------------------------------
// ParserInput
// -------------------------------------------------------------------------

/// Cursor over the source text plus the diagnostics recorded so far.
pub(crate) struct ParserInput<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    depth: u32,
    max_depth: u32,
    /// Diagnostics in the order they were detected.
    pub(crate) diagnostics: Vec<ParseDiagnostic>,
}

impl<'a> ParserInput<'a> {
    /// Creates a cursor at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            diagnostics: Vec::new(),
        }
    }

    /// Sets the maximum nesting depth.
    pub fn set_max_depth(&mut self, max: u32) {
        self.max_depth = max;
    }

    // -- Depth tracking --

    /// Increments the nesting depth. Returns `false` once the limit is
    /// exceeded.
    pub fn increment_depth(&mut self) -> bool {
        self.depth += 1;
        self.depth <= self.max_depth
    }

    /// Decrements the nesting depth.
    pub fn decrement_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// The configured depth limit.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    // -- Position queries --

    /// Returns the current source location.
    pub fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        }
    }

    /// Current 1-based line.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Returns `true` once all input has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The source between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.input[start..end]
    }

    /// Everything not yet consumed.
    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn save_position(&self) -> SavedPosition {
        SavedPosition {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    pub fn restore_position(&mut self, saved: SavedPosition) {
        self.pos = saved.pos;
        self.line = saved.line;
        self.column = saved.column;
    }

    // -- Peek operations --

    /// The byte at the cursor.
    pub fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    /// The byte `offset` bytes past the cursor.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    /// The character at the cursor.
    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    // -- Advance operations --

    /// Advances `count` bytes, keeping line and column in step. The cursor
    /// never stops inside a UTF-8 sequence.
    pub fn advance(&mut self, count: usize) {
        let end = (self.pos + count).min(self.input.len());
        for &b in &self.input.as_bytes()[self.pos..end] {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if b & 0xC0 != 0x80 {
                self.column += 1;
            }
        }
        self.pos = end;
        while !self.input.is_char_boundary(self.pos) {
            self.pos += 1;
        }
    }

    /// Consumes and returns the next character.
    pub fn next_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.advance(ch.len_utf8());
        Some(ch)
    }

    // -- Lookahead --

    /// Returns `true` if the remaining input starts with `s`.
    pub fn looking_at(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    /// ASCII case-insensitive [`looking_at`](Self::looking_at).
    pub fn looking_at_ci(&self, s: &str) -> bool {
        self.remaining()
            .as_bytes()
            .get(..s.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(s.as_bytes()))
    }

    /// Returns `true` if the cursor sits on `<` followed by a name start.
    pub fn at_start_tag(&self) -> bool {
        self.peek() == Some(b'<')
            && self.remaining()[1..]
                .chars()
                .next()
                .is_some_and(|c| is_name_start_char(c) && c != ':')
    }

    // -- Consumption helpers --

    /// Skips whitespace. Returns `true` if any was consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.advance(1);
        }
        self.pos > start
    }

    /// Consumes ASCII bytes while `pred` holds.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !b.is_ascii() || !pred(b) {
                break;
            }
            self.advance(1);
        }
        self.slice(start, self.pos)
    }

    /// Consumes everything up to `delimiter` and the delimiter itself,
    /// returning the text before it. If the delimiter never appears the
    /// rest of the input is consumed and returned as `Err`.
    pub fn take_until(&mut self, delimiter: &str) -> Result<&'a str, &'a str> {
        let start = self.pos;
        if let Some(offset) = self.remaining().find(delimiter) {
            self.advance(offset);
            let text = self.slice(start, self.pos);
            self.advance(delimiter.len());
            Ok(text)
        } else {
            self.advance(self.input.len() - start);
            Err(self.slice(start, self.pos))
        }
    }

    /// Scans an XML `Name`. Returns `None`, consuming nothing, if the cursor
    /// is not on a name start character.
    pub fn parse_name(&mut self) -> Option<&'a str> {
        let first = self.peek_char()?;
        if !is_name_start_char(first) {
            return None;
        }
        let start = self.pos;
        self.advance(first.len_utf8());
        while let Some(c) = self.peek_char() {
            if !is_name_char(c) {
                break;
            }
            self.advance(c.len_utf8());
        }
        Some(self.slice(start, self.pos))
    }

    /// Scans a quoted literal, returning its body without the quotes.
    /// Returns `None`, consuming nothing, if the cursor is not on a quote.
    pub fn parse_quoted(&mut self) -> Option<Result<&'a str, &'a str>> {
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return None,
        };
        self.advance(1);
        let delimiter = if quote == b'"' { "\"" } else { "'" };
        Some(self.take_until(delimiter))
    }

    // -- Diagnostics --

    /// Records a diagnostic at the current location.
    pub fn push_diagnostic(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        let location = self.location();
        self.push_diagnostic_at(severity, message, location);
    }

    /// Records a diagnostic at an earlier location.
    pub fn push_diagnostic_at(
        &mut self,
        severity: ErrorSeverity,
        message: impl Into<String>,
        location: SourceLocation,
    ) {
        self.diagnostics.push(ParseDiagnostic {
            severity,
            message: message.into(),
            location,
        });
    }
}

// -------------------------------------------------------------------------
// Namespace resolver
// -------------------------------------------------------------------------

/// The well-known XML namespace URI, pre-bound to the `xml` prefix.
pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Stack of namespace binding frames mirroring element nesting.
pub(crate) struct NamespaceResolver {
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceResolver {
    /// Creates a resolver with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        Self {
            stack: vec![vec![(Some("xml".to_owned()), XML_NAMESPACE.to_owned())]],
        }
    }

    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Binds `prefix` (or the default namespace for `None`) in the current
    /// scope.
    pub fn bind(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix.map(str::to_owned), uri.to_owned()));
        }
    }

    /// Resolves a prefix, innermost binding first. `xmlns=""` undeclares the
    /// default namespace.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(uri.as_str()))
    }
}
