//! Standalone element handles.

use std::borrow::Cow;

use crate::collection::CollectionItem;
use crate::tree::{Attribute, Document, NodeId, NodeKind, NodeRef};

use super::node;
use super::DocumentKind;

/// A copy of a matched element, detached from the finder it came from.
///
/// Each handle owns its own tree, so setting or removing attributes is only
/// visible through that handle.
///
/// ```
/// use elementfinder::ElementFinder;
///
/// let finder = ElementFinder::new(r#"<div><span title="Hello">x</span></div>"#).unwrap();
/// let elements = finder.element("//span").unwrap();
/// let mut span = elements.first().unwrap().unwrap().clone();
/// span.set_attribute("title", "Changed");
/// assert_eq!(span.attribute("title"), Some("Changed"));
///
/// let again = finder.element("//span").unwrap();
/// assert_eq!(again.first().unwrap().unwrap().attribute("title"), Some("Hello"));
/// ```
#[derive(Debug, Clone)]
pub struct Element {
    doc: Document,
    node: NodeId,
    kind: DocumentKind,
    /// What was matched, when it was not an element.
    found: Option<&'static str>,
}

impl Element {
    /// Copies `node` out of `source`.
    pub(crate) fn from_match(source: &Document, node: NodeRef, kind: DocumentKind) -> Self {
        match node {
            NodeRef::Node(id) => {
                let doc = source.import_subtree(id);
                let copy = doc.first_child(doc.root()).unwrap_or_else(|| doc.root());
                let found = match &source.node(id).kind {
                    NodeKind::Element { .. } => None,
                    NodeKind::Document => Some("document"),
                    NodeKind::Text { .. } => Some("text"),
                    NodeKind::CData { .. } => Some("CDATA section"),
                    NodeKind::Comment { .. } => Some("comment"),
                    NodeKind::ProcessingInstruction { .. } => Some("processing instruction"),
                    NodeKind::DocumentType { .. } => Some("document type"),
                };
                Self {
                    doc,
                    node: copy,
                    kind,
                    found,
                }
            }
            NodeRef::Attribute { .. } => {
                let mut doc = Document::new();
                let text = doc.create_node(NodeKind::text(source.value_of(node)));
                let root = doc.root();
                doc.append_child(root, text);
                Self {
                    doc,
                    node: text,
                    kind,
                    found: Some("attribute"),
                }
            }
        }
    }

    /// The element name as written, `prefix:name` when prefixed.
    #[must_use]
    pub fn name(&self) -> Option<Cow<'_, str>> {
        self.doc.qualified_name(self.node)
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.doc.attribute(self.node, name)
    }

    /// All attributes in source order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        self.doc.attributes(self.node)
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Sets an attribute, replacing any existing value. Returns `false` when
    /// the handle does not hold an element.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        self.doc.set_attribute(self.node, name, value)
    }

    /// Removes an attribute and returns its old value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.doc.remove_attribute(self.node, name)
    }

    /// The flattened text of the element.
    #[must_use]
    pub fn text(&self) -> String {
        self.doc.value_of(self.node.into())
    }

    /// Markup of the element's children.
    #[must_use]
    pub fn inner_html(&self) -> String {
        node::inner_content(&self.doc, self.node.into(), self.kind)
    }

    /// Markup of the element itself.
    #[must_use]
    pub fn outer_html(&self) -> String {
        node::outer_content(&self.doc, self.node.into(), self.kind)
    }

    /// The handle's own tree.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The element's id within [`document`](Self::document).
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl CollectionItem for Element {
    fn check(&self) -> Result<(), String> {
        match self.found {
            None => Ok(()),
            Some(found) => Err(format!("expected an element, found {found}")),
        }
    }
}
