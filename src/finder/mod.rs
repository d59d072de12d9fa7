//! The query and transform engine.
//!
//! An [`ElementFinder`] owns one parsed document. Queries go through its
//! [`ExpressionTranslator`], run as `XPath` with the root element as context,
//! and come back as collections. Nothing mutates the finder: [`modify`] and
//! [`remove`] edit a deep copy and return it.
//!
//! [`modify`]: ElementFinder::modify
//! [`remove`]: ElementFinder::remove

mod element;
mod modifier;
mod node;
mod translator;

pub use element::Element;
pub use modifier::{Modifier, RemoveElements};
pub use translator::{ExpressionTranslator, XPathExpression};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::collection::{CollectionItem, ElementCollection, ObjectCollection, StringCollection};
use crate::encoding::{decode_html_to_utf8, decode_to_utf8, safe_encode};
use crate::error::{Error, ParseDiagnostic};
use crate::html::{parse_html_with_options, HtmlParseOptions};
use crate::parser::{parse_document, ParseOptions};
use crate::tree::{Document, NodeRef};
use crate::xpath::{self, XPathContext};

/// Stands in for fragments with no markup, so nested finders always have a
/// document element.
const EMPTY_DOCUMENT: &str = "<html data-document-is-empty></html>";

/// Characters a fragment may consist of and still count as empty. U+00A0
/// and other Unicode spaces are content.
const BLANK: [char; 6] = [' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Which parser a finder uses.
///
/// ```
/// use elementfinder::DocumentKind;
///
/// assert_eq!("XML".parse::<DocumentKind>().unwrap(), DocumentKind::Xml);
/// assert!("json".parse::<DocumentKind>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentKind {
    /// Error-tolerant HTML. Input is passed through
    /// [`safe_encode`](crate::encoding::safe_encode) first.
    #[default]
    Html,
    /// XML, parsed with recovery.
    Xml,
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("html") {
            Ok(Self::Html)
        } else if s.eq_ignore_ascii_case("xml") {
            Ok(Self::Xml)
        } else {
            Err(Error::InvalidDocumentKind(s.to_owned()))
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("html"),
            Self::Xml => f.write_str("xml"),
        }
    }
}

/// How a finder is built. Nested finders created by
/// [`object`](ElementFinder::object) inherit their parent's options.
///
/// ```
/// use elementfinder::{DocumentKind, FinderOptions};
/// use elementfinder::html::HtmlParseOptions;
///
/// let options = FinderOptions::default()
///     .kind(DocumentKind::Html)
///     .html(HtmlParseOptions::default().no_blanks(true));
/// assert!(options.html.no_blanks);
/// ```
#[derive(Clone)]
pub struct FinderOptions {
    /// Which parser to use.
    pub kind: DocumentKind,
    /// Converts caller expressions into `XPath`.
    pub translator: Arc<dyn ExpressionTranslator>,
    /// XML parser settings. Recovery is always on for finders.
    pub parse: ParseOptions,
    /// HTML parser settings.
    pub html: HtmlParseOptions,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            kind: DocumentKind::default(),
            translator: Arc::new(XPathExpression),
            parse: ParseOptions::default(),
            html: HtmlParseOptions::default(),
        }
    }
}

impl fmt::Debug for FinderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderOptions")
            .field("kind", &self.kind)
            .field("parse", &self.parse)
            .field("html", &self.html)
            .finish_non_exhaustive()
    }
}

impl FinderOptions {
    /// Sets the document kind.
    #[must_use]
    pub fn kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the expression translator.
    #[must_use]
    pub fn translator(mut self, translator: impl ExpressionTranslator + 'static) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    /// Sets a translator that is already shared.
    #[must_use]
    pub fn shared_translator(mut self, translator: Arc<dyn ExpressionTranslator>) -> Self {
        self.translator = translator;
        self
    }

    /// Sets the XML parser options.
    #[must_use]
    pub fn parse(mut self, parse: ParseOptions) -> Self {
        self.parse = parse;
        self
    }

    /// Sets the HTML parser options.
    #[must_use]
    pub fn html(mut self, html: HtmlParseOptions) -> Self {
        self.html = html;
        self
    }
}

/// A parsed document that answers queries.
///
/// # Examples
///
/// ```
/// use elementfinder::ElementFinder;
///
/// let page = ElementFinder::new(r#"<ul><li><a href="/a">A</a></li><li><a href="/b">B</a></li></ul>"#)?;
/// let links = page.value("//a/@href")?;
/// assert_eq!(links.all()?, ["/a", "/b"]);
///
/// let trimmed = page.remove("//li[2]")?;
/// assert_eq!(trimmed.value("//a")?.count()?, 1);
/// assert_eq!(page.value("//a")?.count()?, 2);
/// # Ok::<(), elementfinder::Error>(())
/// ```
#[derive(Clone)]
pub struct ElementFinder {
    doc: Document,
    options: FinderOptions,
}

impl fmt::Debug for ElementFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementFinder")
            .field("kind", &self.options.kind)
            .field("nodes", &self.doc.node_count())
            .field("load_errors", &self.doc.diagnostics.len())
            .finish_non_exhaustive()
    }
}

impl CollectionItem for ElementFinder {}

impl ElementFinder {
    /// Parses `data` as HTML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySource`] if `data` is empty.
    pub fn new(data: &str) -> Result<Self, Error> {
        Self::with_options(data, FinderOptions::default())
    }

    /// Parses `data` as the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySource`] if `data` is empty.
    pub fn with_kind(data: &str, kind: DocumentKind) -> Result<Self, Error> {
        Self::with_options(data, FinderOptions::default().kind(kind))
    }

    /// Parses `data` with explicit options.
    ///
    /// Malformed markup is not an error; see [`load_errors`](Self::load_errors).
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySource`] if `data` is empty.
    pub fn with_options(data: &str, options: FinderOptions) -> Result<Self, Error> {
        if data.is_empty() {
            return Err(Error::EmptySource);
        }
        let doc = match options.kind {
            DocumentKind::Html => parse_html_with_options(&safe_encode(data), &options.html),
            DocumentKind::Xml => parse_document(data, &options.parse),
        };
        debug!(
            kind = %options.kind,
            bytes = data.len(),
            diagnostics = doc.diagnostics.len(),
            "document loaded"
        );
        Ok(Self { doc, options })
    }

    /// Decodes `bytes` and parses the result.
    ///
    /// HTML honors a BOM, then `<meta charset>`, then the XML declaration,
    /// and falls back to windows-1252 for undeclared non-UTF-8 input. XML
    /// honors a BOM, then the declaration, and otherwise requires UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySource`] if `bytes` is empty and
    /// [`Error::Encoding`] if XML input cannot be decoded.
    pub fn from_bytes(bytes: &[u8], options: FinderOptions) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::EmptySource);
        }
        let text = match options.kind {
            DocumentKind::Html => decode_html_to_utf8(bytes),
            DocumentKind::Xml => decode_to_utf8(bytes)?,
        };
        Self::with_options(&text, options)
    }

    /// Runs `expression` and returns the matched nodes in document order.
    ///
    /// Expressions that evaluate to a number, string or boolean match
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::XPath`] if the translated expression is invalid, or
    /// whatever the translator reports.
    pub fn query(&self, expression: &str) -> Result<Vec<NodeRef>, Error> {
        let translated = self.options.translator.translate(expression)?;
        trace!(expression, xpath = %translated, "query");
        let wrap = |source| Error::XPath {
            expression: translated.clone(),
            source,
        };
        let compiled = xpath::parser::parse(&translated).map_err(wrap)?;
        let context = self.doc.root_element().unwrap_or_else(|| self.doc.root());
        let value = XPathContext::new(&self.doc, context)
            .evaluate(&compiled)
            .map_err(wrap)?;
        if value.as_node_set().is_none() {
            trace!(result = value.type_name(), "query did not select nodes");
        }
        Ok(value.into_node_set().unwrap_or_default())
    }

    /// Markup inside each matched node.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn content(&self, expression: &str) -> Result<StringCollection, Error> {
        self.markup(expression, node::inner_content)
    }

    /// Markup of each matched node, including the node itself.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn outer_content(&self, expression: &str) -> Result<StringCollection, Error> {
        self.markup(expression, node::outer_content)
    }

    fn markup(
        &self,
        expression: &str,
        render: fn(&Document, NodeRef, DocumentKind) -> String,
    ) -> Result<StringCollection, Error> {
        Ok(self
            .query(expression)?
            .into_iter()
            .map(|node| render(&self.doc, node, self.options.kind))
            .collect())
    }

    /// The value of each match: attribute values, node text, or the
    /// flattened text of elements.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn value(&self, expression: &str) -> Result<StringCollection, Error> {
        Ok(self
            .query(expression)?
            .into_iter()
            .map(|node| self.doc.value_of(node))
            .collect())
    }

    /// Pairs the values of two queries by position.
    ///
    /// Repeated keys keep their first position and their last value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CardinalityMismatch`] when the two queries match
    /// different numbers of nodes.
    pub fn key_value(
        &self,
        key_expression: &str,
        value_expression: &str,
    ) -> Result<IndexMap<String, String>, Error> {
        let keys = self.query(key_expression)?;
        let values = self.query(value_expression)?;
        if keys.len() != values.len() {
            return Err(Error::CardinalityMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        Ok(keys
            .into_iter()
            .zip(values)
            .map(|(k, v)| (self.doc.value_of(k), self.doc.value_of(v)))
            .collect())
    }

    /// A new finder for the inside of each match.
    ///
    /// Blank fragments become an empty placeholder document, and XML
    /// fragments without a declaration are wrapped in `<root>`.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn object(&self, expression: &str) -> Result<ObjectCollection, Error> {
        self.objects(expression, node::inner_content)
    }

    /// Like [`object`](Self::object), but each fragment includes the matched
    /// node itself.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn outer_object(&self, expression: &str) -> Result<ObjectCollection, Error> {
        self.objects(expression, node::outer_content)
    }

    fn objects(
        &self,
        expression: &str,
        render: fn(&Document, NodeRef, DocumentKind) -> String,
    ) -> Result<ObjectCollection, Error> {
        let nodes = self.query(expression)?;
        let mut items = Vec::with_capacity(nodes.len());
        for node in nodes {
            let mut markup = render(&self.doc, node, self.options.kind);
            if markup.trim_matches(BLANK).is_empty() {
                EMPTY_DOCUMENT.clone_into(&mut markup);
            }
            if self.options.kind == DocumentKind::Xml && !markup.contains("<?xml") {
                markup = format!("<root>{markup}</root>");
            }
            items.push(Self::with_options(&markup, self.options.clone())?);
        }
        debug!(expression, count = items.len(), "nested finders built");
        Ok(ObjectCollection::new(items))
    }

    /// Standalone copies of the matched elements. Every call makes fresh
    /// copies.
    ///
    /// Matching anything other than elements makes the collection invalid.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn element(&self, expression: &str) -> Result<ElementCollection, Error> {
        Ok(self
            .query(expression)?
            .into_iter()
            .map(|node| Element::from_match(&self.doc, node, self.options.kind))
            .collect())
    }

    /// A copy of this finder with the matched nodes and attributes removed.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn remove(&self, expression: &str) -> Result<Self, Error> {
        self.modify(expression, &RemoveElements)
    }

    /// A copy of this finder with `modifier` applied to the nodes
    /// `expression` matches in the copy.
    ///
    /// # Errors
    ///
    /// See [`query`](Self::query).
    pub fn modify<M>(&self, expression: &str, modifier: &M) -> Result<Self, Error>
    where
        M: Modifier + ?Sized,
    {
        let mut copy = self.clone();
        let nodes = copy.query(expression)?;
        modifier.modify(&mut copy.doc, &nodes);
        debug!(expression, matched = nodes.len(), "modified copy");
        Ok(copy)
    }

    /// Diagnostics recorded while parsing, in source order.
    #[must_use]
    pub fn load_errors(&self) -> &[ParseDiagnostic] {
        &self.doc.diagnostics
    }

    /// The document kind.
    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.options.kind
    }

    /// The parsed tree.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The expression translator, shared with nested finders and copies.
    #[must_use]
    pub fn translator(&self) -> &Arc<dyn ExpressionTranslator> {
        &self.options.translator
    }

    /// The options this finder was built with.
    #[must_use]
    pub fn options(&self) -> &FinderOptions {
        &self.options
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_finder_is_send_and_sync() {
        assert_send_sync::<ElementFinder>();
        assert_send_sync::<ObjectCollection>();
    }

    #[test]
    fn test_document_kind_parsing() {
        assert_eq!("html".parse::<DocumentKind>().unwrap(), DocumentKind::Html);
        assert_eq!("Xml".parse::<DocumentKind>().unwrap(), DocumentKind::Xml);
        assert_eq!(
            "yaml".parse::<DocumentKind>().unwrap_err(),
            Error::InvalidDocumentKind("yaml".into())
        );
        assert_eq!(DocumentKind::Xml.to_string(), "xml");
        assert_eq!(DocumentKind::default(), DocumentKind::Html);
    }

    #[test]
    fn test_empty_source_rejected() {
        assert_eq!(ElementFinder::new("").unwrap_err(), Error::EmptySource);
        assert_eq!(
            ElementFinder::from_bytes(b"", FinderOptions::default()).unwrap_err(),
            Error::EmptySource
        );
    }

    #[test]
    fn test_query_context_is_root_element() {
        let finder = ElementFinder::with_kind("<r><a/></r>", DocumentKind::Xml).unwrap();
        let nodes = finder.query("a").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(finder.query("/r/a").unwrap(), nodes);
        assert!(finder.query("count(a)").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_expression() {
        let finder = ElementFinder::new("<p>x</p>").unwrap();
        let err = finder.query("//p[").unwrap_err();
        assert!(matches!(err, Error::XPath { ref expression, .. } if expression == "//p["));
    }

    #[test]
    fn test_empty_translation_is_invalid() {
        let strict = |_: &str| -> String { String::new() };
        let finder = ElementFinder::with_options(
            "<p>x</p>",
            FinderOptions::default().translator(strict),
        )
        .unwrap();
        assert!(matches!(finder.query("p"), Err(Error::XPath { .. })));
    }

    #[test]
    fn test_key_value_duplicate_keys() {
        let xml = "<r><k>a</k><v>1</v><k>b</k><v>2</v><k>a</k><v>3</v></r>";
        let finder = ElementFinder::with_kind(xml, DocumentKind::Xml).unwrap();
        let map = finder.key_value("//k", "//v").unwrap();
        let pairs: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, [("a", "3"), ("b", "2")]);
        assert_eq!(
            finder.key_value("//k", "//v[1]").unwrap_err(),
            Error::CardinalityMismatch { keys: 3, values: 1 }
        );
    }

    #[test]
    fn test_non_breaking_space_is_content() {
        let page = ElementFinder::new("<div>&nbsp;</div><div>\u{a0}</div><div> \t\n</div>").unwrap();
        let objects = page.object("//div").unwrap();
        assert_eq!(objects.count().unwrap(), 3);
        for nested in &objects.all().unwrap()[..2] {
            let markup = nested.content("/").unwrap().into_items().unwrap();
            assert!(!markup[0].contains("data-document-is-empty"), "{markup:?}");
            assert_eq!(nested.value("//body").unwrap().all().unwrap(), ["\u{a0}"]);
        }
        let blank = objects.last().unwrap().unwrap();
        assert!(blank.content("/").unwrap().all().unwrap()[0].contains("data-document-is-empty"));
    }

    #[test]
    fn test_xml_objects_are_wrapped() {
        let finder =
            ElementFinder::with_kind("<r><item><a>1</a></item><item/></r>", DocumentKind::Xml)
                .unwrap();
        let objects = finder.object("//item").unwrap();
        let first = objects.first().unwrap().unwrap();
        assert_eq!(first.kind(), DocumentKind::Xml);
        assert_eq!(first.value("/root/a").unwrap().all().unwrap(), ["1"]);
        let second = objects.get(1).unwrap().unwrap();
        // The placeholder attribute has no value, which XML rejects.
        assert_eq!(second.outer_content("/root/*").unwrap().all().unwrap(), ["<html/>"]);
        assert_eq!(second.load_errors().len(), 1);
    }

    #[test]
    fn test_outer_object_keeps_matched_node() {
        let finder = ElementFinder::new(r#"<div class="c"><b>x</b></div>"#).unwrap();
        let objects = finder.outer_object("//div").unwrap();
        let inner = objects.first().unwrap().unwrap();
        assert_eq!(inner.value("//div/@class").unwrap().all().unwrap(), ["c"]);
    }

    #[test]
    fn test_modify_leaves_receiver_alone() {
        let finder = ElementFinder::new("<p><b>1</b><b>2</b></p>").unwrap();
        let stamp = |doc: &mut Document, nodes: &[NodeRef]| {
            for node in nodes {
                doc.set_attribute(node.node_id(), "seen", "yes");
            }
        };
        let stamped = finder.modify("//b", &stamp).unwrap();
        assert_eq!(stamped.value("//b/@seen").unwrap().count().unwrap(), 2);
        assert_eq!(finder.value("//b/@seen").unwrap().count().unwrap(), 0);
        assert!(Arc::ptr_eq(finder.translator(), stamped.translator()));
    }

    #[test]
    fn test_from_bytes_xml_encoding_error() {
        let options = FinderOptions::default().kind(DocumentKind::Xml);
        let err = ElementFinder::from_bytes(&[b'<', 0xFF, b'>'], options).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn test_from_bytes_html_latin1() {
        let finder = ElementFinder::from_bytes(b"<p>caf\xE9</p>", FinderOptions::default()).unwrap();
        assert_eq!(finder.value("//p").unwrap().all().unwrap(), ["caf\u{e9}"]);
    }
}
