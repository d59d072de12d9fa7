//! `XPath` 1.0 over the document tree.
//!
//! Expressions are compiled by [`parser::parse`] into an [`ast::Expr`] and
//! evaluated by [`XPathContext`]. Node-sets are sequences of
//! [`NodeRef`](crate::tree::NodeRef), so `//a/@href` returns the attributes
//! themselves rather than their owner elements.
//!
//! ```
//! use elementfinder::Document;
//! use elementfinder::xpath::{evaluate, XPathValue};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let result = evaluate(&doc, doc.root(), "count(/root/*)").unwrap();
//! assert_eq!(result, XPathValue::Number(2.0));
//! ```
//!
//! # Known Limitations
//!
//! - The `namespace::` axis is always empty, and `xmlns` declarations are
//!   not returned by the attribute axis.
//! - Only the 27 core functions are available. Extension functions give
//!   `Unregistered function`.
//!
//! # Submodules
//!
//! - [`ast`]: the compiled expression tree.
//! - [`lexer`]: tokenizer with operator/name disambiguation.
//! - [`parser`]: recursive descent parser.
//! - [`types`]: values, number formatting and errors.
//! - [`eval`]: the evaluator.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

pub use eval::XPathContext;
pub use types::{XPathError, XPathValue};

use crate::tree::{Document, NodeRef};

/// Compiles and evaluates `expr` with `context` as the context node.
///
/// For running one expression against many context nodes, compile it once
/// with [`parser::parse`] and reuse an [`XPathContext`].
///
/// # Errors
///
/// Returns an `XPathError` if the expression does not compile or fails
/// during evaluation.
///
/// ```
/// use elementfinder::Document;
/// use elementfinder::xpath::evaluate;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// let value = evaluate(&doc, root, "string(child)").unwrap();
/// assert_eq!(value.to_string(), "Hello");
/// ```
pub fn evaluate(
    doc: &Document,
    context: impl Into<NodeRef>,
    expr: &str,
) -> Result<XPathValue, XPathError> {
    let compiled = parser::parse(expr)?;
    XPathContext::new(doc, context).evaluate(&compiled)
}
