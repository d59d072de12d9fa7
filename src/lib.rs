//! # elementfinder
//!
//! Query and transform HTML or XML documents with `XPath`. Load markup once,
//! run as many queries as you like, and derive modified copies while the
//! original stays untouched.
//!
//! ## Quick Start
//!
//! ```
//! use elementfinder::{DocumentKind, ElementFinder};
//!
//! let xml = r#"<menu><food><price value="$5.95"/></food><food><price value="$7.95"/></food></menu>"#;
//! let menu = ElementFinder::with_kind(xml, DocumentKind::Xml)?;
//!
//! let prices = menu
//!     .value("//price/@value")?
//!     .replace("!^\\$(.+)!", "$1 USD")?;
//! assert_eq!(prices.all()?, ["5.95 USD", "7.95 USD"]);
//!
//! let smaller = menu.remove("//food[1]")?;
//! assert_eq!(smaller.value("//food")?.count()?, 1);
//! assert_eq!(menu.value("//food")?.count()?, 2);
//! # Ok::<(), elementfinder::Error>(())
//! ```
//!
//! Malformed markup never fails to load. What the parser had to repair is
//! reported by [`ElementFinder::load_errors`]:
//!
//! ```
//! use elementfinder::ElementFinder;
//!
//! let page = ElementFinder::new("<body><span></span></span></body>")?;
//! assert_eq!(page.load_errors()[0].message, "Unexpected end tag : span");
//! # Ok::<(), elementfinder::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`finder`]: [`ElementFinder`], translators and modifiers.
//! - [`collection`]: the result collections.
//! - [`tree`], [`parser`], [`html`], [`serial`]: the document model, the
//!   recovering XML and HTML parsers, and markup output.
//! - [`xpath`]: the `XPath` 1.0 engine.
//! - [`encoding`], [`pattern`]: byte decoding, the HTML pre-parse pass and
//!   delimited regex patterns.

pub mod collection;
pub mod encoding;
pub mod error;
pub mod finder;
pub mod html;
pub mod parser;
pub mod pattern;
pub mod serial;
pub mod tree;
pub mod xpath;

// Re-export primary types at the crate root for convenience.
pub use collection::{
    Collection, CollectionItem, ElementCollection, ObjectCollection, StringCollection,
};
pub use error::{Error, ParseDiagnostic};
pub use finder::{
    DocumentKind, Element, ElementFinder, ExpressionTranslator, FinderOptions, Modifier,
    RemoveElements, XPathExpression,
};
pub use tree::{Attribute, Document, NodeId, NodeRef};
