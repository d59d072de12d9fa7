//! `XPath` values, errors and number conversions.
//!
//! XPath 1.0 has four value types: node-set, boolean, number and string.
//! The string forms of numbers follow XPath section 4.2 (`1` not `1.0`,
//! `NaN`, `Infinity`), which differs from Rust's `f64` formatting.

use std::fmt;

use crate::tree::NodeRef;

// ---------------------------------------------------------------------------
// XPathValue
// ---------------------------------------------------------------------------

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// Nodes in document order without duplicates.
    NodeSet(Vec<NodeRef>),
    /// A boolean.
    Boolean(bool),
    /// An IEEE 754 double.
    Number(f64),
    /// A string.
    String(String),
}

impl XPathValue {
    /// Converts to a boolean (XPath 4.3). Node-sets are true when non-empty.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::NodeSet(nodes) => !nodes.is_empty(),
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
        }
    }

    /// The node-set, if this value is one.
    #[must_use]
    pub fn as_node_set(&self) -> Option<&[NodeRef]> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Consumes the value, returning its nodes. Scalars give `None`.
    #[must_use]
    pub fn into_node_set(self) -> Option<Vec<NodeRef>> {
        match self {
            Self::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Name of the value type, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NodeSet(_) => "node-set",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for XPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeSet(nodes) => write!(f, "<node-set of {} nodes>", nodes.len()),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Formats a number the way XPath's `string()` does.
///
/// ```
/// use elementfinder::xpath::types::format_number;
///
/// assert_eq!(format_number(3.0), "3");
/// assert_eq!(format_number(-0.0), "0");
/// assert_eq!(format_number(0.5), "0.5");
/// assert_eq!(format_number(f64::NAN), "NaN");
/// ```
#[must_use]
#[allow(clippy::float_cmp)]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    #[allow(clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return (n as i64).to_string();
    }
    // Rust's shortest round-trip form, which never uses an exponent.
    format!("{n}")
}

/// Parses a string the way XPath's `number()` does: optional whitespace,
/// an optional minus, digits with at most one `.`. Anything else is NaN.
#[must_use]
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let mut seen_dot = false;
    let mut seen_digit = false;
    for b in digits.bytes() {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => return f64::NAN,
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// XPathError
// ---------------------------------------------------------------------------

/// An error raised while compiling or evaluating an expression.
///
/// Messages use libxml2's vocabulary (`Invalid expression`, `Unregistered
/// function`, ...). Compile errors carry the byte offset where the problem
/// was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into the expression, for compile errors.
    pub position: Option<usize>,
}

impl XPathError {
    pub(crate) fn at(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position: Some(position),
        }
    }

    pub(crate) fn eval(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }
}

impl fmt::Display for XPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(f, "{} at position {pos}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for XPathError {}
