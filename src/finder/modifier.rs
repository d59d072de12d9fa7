//! In-place edits applied by [`ElementFinder::modify`](super::ElementFinder::modify).

use crate::tree::{Document, NodeRef};

/// Mutates a document given the nodes a query matched.
///
/// The finder only ever hands a modifier a private copy of its tree, so
/// implementations are free to change anything.
pub trait Modifier {
    /// Applies the edit. `nodes` are in document order.
    fn modify(&self, doc: &mut Document, nodes: &[NodeRef]);
}

impl<F> Modifier for F
where
    F: Fn(&mut Document, &[NodeRef]),
{
    fn modify(&self, doc: &mut Document, nodes: &[NodeRef]) {
        self(doc, nodes);
    }
}

/// Removes matched nodes: attributes are dropped from their owner, anything
/// else is detached together with its subtree. The document node itself is
/// never removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveElements;

impl Modifier for RemoveElements {
    fn modify(&self, doc: &mut Document, nodes: &[NodeRef]) {
        // Attribute indices shift on removal, so resolve names first.
        let attributes: Vec<_> = nodes
            .iter()
            .filter_map(|&node| match node {
                NodeRef::Attribute { owner, index } => doc
                    .attribute_at(owner, index)
                    .map(|a| (owner, a.qualified_name().into_owned())),
                NodeRef::Node(_) => None,
            })
            .collect();
        for (owner, name) in attributes {
            doc.remove_attribute(owner, &name);
        }

        let root = doc.root();
        for &node in nodes {
            if let NodeRef::Node(id) = node {
                if id != root {
                    doc.remove_node(id);
                }
            }
        }
    }
}
