//! Node payloads.
//!
//! `NodeKind` carries what a node *is*; the links that say where it sits in
//! the tree live in [`NodeData`](super::NodeData).

use super::Attribute;

/// The kind of a node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element, e.g. `<div class="x">`.
    Element {
        /// Local name. HTML elements keep their lowercased full name here.
        name: String,
        /// Namespace prefix (`svg` in `svg:rect`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes in source order.
        attributes: Vec<Attribute>,
    },

    /// Character data with references already decoded.
    Text {
        /// The decoded text.
        content: String,
    },

    /// A CDATA section. Content is stored and written back verbatim.
    CData {
        /// Section body without the `<![CDATA[` and `]]>` delimiters.
        content: String,
    },

    /// A comment, without the `<!--` and `-->` delimiters.
    Comment {
        /// Comment body.
        content: String,
    },

    /// A processing instruction, e.g. `<?xml-stylesheet href="a.xsl"?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// Everything after the target, if present.
        data: Option<String>,
    },

    /// A document type declaration.
    DocumentType {
        /// The declared root element name.
        name: String,
        /// SYSTEM identifier, if any.
        system_id: Option<String>,
        /// PUBLIC identifier, if any.
        public_id: Option<String>,
        /// Raw internal subset between `[` and `]`, if any.
        internal_subset: Option<String>,
    },
}

impl NodeKind {
    /// Convenience constructor for an element with no namespace.
    #[must_use]
    pub fn element(name: impl Into<String>) -> Self {
        Self::Element {
            name: name.into(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        }
    }

    /// Convenience constructor for a text node.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }
}
