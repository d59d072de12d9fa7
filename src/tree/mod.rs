//! Arena-based document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the [`Document`]
//! and are referenced by [`NodeId`], a newtype over `NonZeroU32`. Navigation
//! links (parent, first/last child, siblings) are arena indices, so the tree
//! has no reference cycles and no per-node allocations.
//!
//! Because the whole tree is one `Vec`, `Document::clone` is a deep copy.
//! The finder relies on that for copy-on-modify: a cloned document shares
//! nothing with its source.
//!
//! Attributes are not arena nodes. Code that needs to address "a node or an
//! attribute" uniformly, such as the `XPath` evaluator, uses [`NodeRef`].

mod node;

pub use node::NodeKind;

use std::borrow::Cow;
use std::num::NonZeroU32;

use crate::error::{ParseDiagnostic, ParseError};

/// The namespace bound to `xmlns` declarations themselves.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// A typed index into the document's node arena.
///
/// `Option<NodeId>` has the same size as `NodeId` thanks to the niche in
/// `NonZeroU32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw arena index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0, which is reserved for the placeholder slot.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    /// Returns the raw arena index.
    pub(crate) fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// A reference to either a tree node or one attribute of an element.
///
/// Query results are sequences of `NodeRef`s. An attribute is addressed by
/// its owner element and its position in the owner's attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A node stored in the arena.
    Node(NodeId),
    /// The `index`-th attribute of `owner`.
    Attribute {
        /// The element carrying the attribute.
        owner: NodeId,
        /// Position in the owner's attribute list.
        index: usize,
    },
}

impl NodeRef {
    /// The arena node this reference is anchored to: the node itself, or the
    /// owner element for attributes.
    #[must_use]
    pub fn node_id(self) -> NodeId {
        match self {
            Self::Node(id) | Self::Attribute { owner: id, .. } => id,
        }
    }

    /// Returns `true` if this refers to an attribute.
    #[must_use]
    pub fn is_attribute(self) -> bool {
        matches!(self, Self::Attribute { .. })
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. The document node has none.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node, kept for O(1) append.
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

/// An attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Local name (`lang` for `xml:lang`). HTML attributes keep their full
    /// lowercased name here and never carry a prefix.
    pub name: String,
    /// The value with references decoded.
    pub value: String,
    /// Namespace prefix, if any.
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any.
    pub namespace: Option<String>,
}

impl Attribute {
    /// Creates an attribute with no namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix: None,
            namespace: None,
        }
    }

    /// The name as written in markup, `prefix:name` when prefixed.
    #[must_use]
    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(p) => Cow::Owned(format!("{p}:{}", self.name)),
            None => Cow::Borrowed(&self.name),
        }
    }
}

/// A parsed HTML or XML document.
///
/// # Examples
///
/// ```
/// use elementfinder::Document;
///
/// let doc = Document::parse_str("<root><child/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("root"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node (not the root element).
    root: NodeId,
    /// XML version from the XML declaration.
    pub version: Option<String>,
    /// Encoding from the XML declaration.
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// Diagnostics recorded while parsing.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Document {
    /// Creates an empty document holding only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            version: None,
            encoding: None,
            standalone: None,
            diagnostics: Vec::new(),
        }
    }

    /// Parses a well-formed XML string.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` on the first well-formedness error. Use
    /// [`crate::parser::parse_str_with_options`] with recovery enabled to get
    /// a best-effort tree instead.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::parser::parse_str(input)
    }

    /// Parses HTML with the default error-tolerant options. Never fails.
    #[must_use]
    pub fn parse_html(input: &str) -> Self {
        crate::html::parse_html(input)
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the first element child of the document node.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns the `NodeData` for a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from another document and is out of range.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the local name of an element or the target of a PI.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the element name as written, `prefix:name` when prefixed.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<Cow<'_, str>> {
        match &self.node(id).kind {
            NodeKind::Element {
                name,
                prefix: Some(p),
                ..
            } => Some(Cow::Owned(format!("{p}:{name}"))),
            NodeKind::Element { name, .. } => Some(Cow::Borrowed(name)),
            _ => None,
        }
    }

    /// Returns the namespace URI of an element node, if any.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the content of a text, CDATA, comment or PI node.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::Comment { content }
            | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text and CDATA content of a node's subtree.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => buf.push_str(content),
            NodeKind::Element { .. } | NodeKind::Document => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
            _ => {}
        }
    }

    /// The textual value of a node reference.
    ///
    /// Attributes give their value, elements and the document give their
    /// flattened text, and character nodes give their content.
    #[must_use]
    pub fn value_of(&self, node: NodeRef) -> String {
        match node {
            NodeRef::Attribute { owner, index } => self
                .attribute_at(owner, index)
                .map(|a| a.value.clone())
                .unwrap_or_default(),
            NodeRef::Node(id) => match &self.node(id).kind {
                NodeKind::Element { .. } | NodeKind::Document => self.text_content(id),
                _ => self.node_text(id).unwrap_or_default().to_owned(),
            },
        }
    }

    // --- Attributes ---

    /// Returns the attributes of an element. Empty for other nodes.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the attribute at `index` on `owner`.
    #[must_use]
    pub fn attribute_at(&self, owner: NodeId, index: usize) -> Option<&Attribute> {
        self.attributes(owner).get(index)
    }

    /// Looks up an attribute value by its name as written in markup.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.qualified_name() == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute on an element, replacing an existing value with the
    /// same name. Returns `false` if `id` is not an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind else {
            return false;
        };
        if let Some(existing) = attributes.iter_mut().find(|a| a.qualified_name() == name) {
            value.clone_into(&mut existing.value);
        } else {
            let (prefix, local) = match name.split_once(':') {
                Some((p, l)) if !p.is_empty() && !l.is_empty() => (Some(p.to_owned()), l),
                _ => (None, name),
            };
            attributes.push(Attribute {
                name: local.to_owned(),
                value: value.to_owned(),
                prefix,
                namespace: None,
            });
        }
        true
    }

    /// Removes an attribute by name and returns its value.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind else {
            return None;
        };
        let pos = attributes.iter().position(|a| a.qualified_name() == name)?;
        Some(attributes.remove(pos).value)
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors, walking up.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns a depth-first iterator over all descendants of a node.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    /// Allocates a new detached node and returns its id.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Appends `child` to the end of `parent`'s child list.
    ///
    /// `child` must be detached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
        } else {
            self.node_mut(parent).first_child = Some(child);
        }
        self.node_mut(parent).last_child = Some(child);
    }

    /// Inserts `new_child` before `reference`. Does nothing if `reference`
    /// is detached.
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
    }

    /// Makes `child` the first child of `parent`.
    pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(first) = self.first_child(parent) {
            self.insert_before(first, child);
        } else {
            self.append_child(parent, child);
        }
    }

    /// Detaches a node and its subtree from the tree.
    ///
    /// The nodes stay allocated in the arena but become unreachable.
    pub fn remove_node(&mut self, id: NodeId) {
        self.detach(id);
    }

    /// Unlinks a node from its parent and siblings.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let data = self.node_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
    }

    /// Copies `node` and its subtree into a fresh document.
    ///
    /// Importing the document node copies all of its children. Only the
    /// reachable subtree is copied, so nodes detached from `self` are left
    /// behind.
    #[must_use]
    pub fn import_subtree(&self, node: NodeId) -> Document {
        let mut out = Document::new();
        let target = out.root();
        if matches!(self.node(node).kind, NodeKind::Document) {
            for child in self.children(node) {
                self.copy_into(child, &mut out, target);
            }
        } else {
            self.copy_into(node, &mut out, target);
        }
        out
    }

    fn copy_into(&self, src: NodeId, out: &mut Document, parent: NodeId) {
        let copy = out.create_node(self.node(src).kind.clone());
        out.append_child(parent, copy);
        for child in self.children(src) {
            self.copy_into(child, out, copy);
        }
    }

    /// Returns the number of arena slots in use, detached nodes included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over the descendants of a node, in document order.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        let mut cursor = current;
        loop {
            if cursor == self.root {
                self.next = None;
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(cursor) {
                self.next = Some(sibling);
                break;
            }
            match self.doc.parent(cursor) {
                Some(parent) => cursor = parent,
                None => {
                    self.next = None;
                    break;
                }
            }
        }
        Some(current)
    }
}
