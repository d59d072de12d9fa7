//! XML 1.0 parser.
//!
//! A hand-rolled recursive descent parser that always recovers. Problems are
//! recorded as [`ParseDiagnostic`](crate::error::ParseDiagnostic)s worded the
//! way libxml2 words them, and a best-effort tree is built regardless. With
//! [`ParseOptions::recover`] off, the first fatal diagnostic is turned into a
//! [`ParseError`] instead.

pub(crate) mod input;
mod xml;

use crate::error::{ErrorSeverity, ParseError};
use crate::tree::Document;

use input::DEFAULT_MAX_DEPTH;

/// Options controlling the XML parser.
///
/// ```
/// use elementfinder::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .recover(true)
///     .no_blanks(true)
///     .max_depth(128);
/// assert!(opts.recover);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Return a best-effort tree instead of failing on malformed input.
    pub recover: bool,
    /// Drop whitespace-only text nodes inside elements.
    pub no_blanks: bool,
    /// Maximum element nesting depth.
    pub max_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recover: false,
            no_blanks: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParseOptions {
    /// Enables or disables error recovery.
    #[must_use]
    pub fn recover(mut self, yes: bool) -> Self {
        self.recover = yes;
        self
    }

    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }
}

/// Parses an XML string with default (strict) options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed and recovery is
/// disabled.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    let doc = parse_document(input, options);
    if options.recover {
        return Ok(doc);
    }
    match doc
        .diagnostics
        .iter()
        .find(|d| d.severity == ErrorSeverity::Fatal)
    {
        Some(first) => Err(ParseError {
            message: first.message.clone(),
            location: first.location,
            diagnostics: doc.diagnostics.clone(),
        }),
        None => Ok(doc),
    }
}

/// Builds the best-effort tree, whatever `options.recover` says.
pub(crate) fn parse_document(input: &str, options: &ParseOptions) -> Document {
    let normalized = input::normalize_newlines(input);
    xml::XmlParser::new(&normalized, options).parse()
}
