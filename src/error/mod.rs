//! Error types and load diagnostics.
//!
//! Two families live here. [`Error`] is the crate-level failure type returned
//! by [`ElementFinder`](crate::ElementFinder) and the result collections for
//! caller mistakes: empty input, unknown document kinds, mismatched key/value
//! counts, invalid collection items, bad expressions or bad regex patterns.
//!
//! Malformed markup is never an [`Error`]. The parsers recover and record
//! what they saw as [`ParseDiagnostic`]s, which the finder exposes through
//! [`ElementFinder::load_errors`](crate::ElementFinder::load_errors). The
//! severity levels and message wording follow libxml2 so callers that grep
//! diagnostics keep working.

use std::fmt;

use thiserror::Error;

use crate::encoding::EncodingError;
use crate::xpath::XPathError;

/// Severity level for a parse diagnostic, matching libxml2's `xmlErrorLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A non-fatal issue that doesn't prevent parsing.
    Warning,
    /// A recoverable error. HTML parse problems are reported at this level.
    Error,
    /// A well-formedness error. The XML parser records these and recovers.
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Source location within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number, counted in characters.
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single diagnostic recorded while loading a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    /// The severity of this diagnostic.
    pub severity: ErrorSeverity,
    /// Human-readable message, worded like libxml2's.
    pub message: String,
    /// Where in the source this was detected.
    pub location: SourceLocation,
}

impl ParseDiagnostic {
    /// The 1-based source line the diagnostic points at.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.location.line
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.location)
    }
}

/// Returned by the parsers when recovery is disabled and the input is not
/// well-formed.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The first fatal message.
    pub message: String,
    /// Where in the source the fatal error occurred.
    pub location: SourceLocation,
    /// Everything recorded up to and including the fatal error.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors returned by the finder and its collections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The finder was constructed from an empty string.
    #[error("Expect not empty string")]
    EmptySource,

    /// A document kind other than `html` or `xml` was requested.
    #[error("Doc type not valid. use xml or html, given `{0}`")]
    InvalidDocumentKind(String),

    /// `key_value` found a different number of keys and values.
    #[error("Keys and values must have equal numbers of elements (keys: {keys}, values: {values})")]
    CardinalityMismatch {
        /// Number of nodes matched by the key expression.
        keys: usize,
        /// Number of nodes matched by the value expression.
        values: usize,
    },

    /// A collection held an item that failed validation.
    #[error("Invalid collection item. Check item {index}: {reason}")]
    InvalidItem {
        /// Zero-based position of the offending item.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The translated expression could not be parsed or evaluated.
    #[error("invalid expression `{expression}`: {source}")]
    XPath {
        /// The expression after translation.
        expression: String,
        /// The underlying evaluator error.
        #[source]
        source: XPathError,
    },

    /// A regex pattern handed to a string collection did not compile.
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// The pattern as the caller wrote it.
        pattern: String,
        /// The compiler's complaint.
        reason: String,
    },

    /// A custom translator refused an expression.
    #[error("cannot translate expression: {0}")]
    Translation(String),

    /// Byte input could not be decoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl Error {
    pub(crate) fn invalid_item(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidItem {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 4,
            column: 17,
            byte_offset: 80,
        };
        assert_eq!(loc.to_string(), "4:17");
    }

    #[test]
    fn test_parse_diagnostic_display_and_line() {
        let diag = ParseDiagnostic {
            severity: ErrorSeverity::Error,
            message: "Unexpected end tag : span".to_string(),
            location: SourceLocation {
                line: 9,
                column: 3,
                byte_offset: 120,
            },
        };
        assert_eq!(diag.line(), 9);
        assert_eq!(diag.to_string(), "error: Unexpected end tag : span at 9:3");
    }

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
        assert_eq!(ErrorSeverity::Error.to_string(), "error");
        assert_eq!(ErrorSeverity::Fatal.to_string(), "fatal error");
    }

    #[test]
    fn test_cardinality_message() {
        let err = Error::CardinalityMismatch { keys: 3, values: 2 };
        assert!(err
            .to_string()
            .starts_with("Keys and values must have equal numbers of elements"));
    }

    #[test]
    fn test_invalid_item_names_index() {
        let err = Error::invalid_item(2, "expected a string");
        assert_eq!(
            err.to_string(),
            "Invalid collection item. Check item 2: expected a string"
        );
    }
}
