//! Inner and outer markup of matched nodes.

use crate::serial;
use crate::tree::{Document, NodeRef};

use super::DocumentKind;

/// The markup of a node's children. For an attribute, its escaped value.
pub(crate) fn inner_content(doc: &Document, node: NodeRef, kind: DocumentKind) -> String {
    match node {
        NodeRef::Node(id) => match kind {
            DocumentKind::Html => serial::inner_html(doc, id),
            DocumentKind::Xml => serial::inner_xml(doc, id),
        },
        NodeRef::Attribute { owner, index } => doc
            .attribute_at(owner, index)
            .map(|a| escape_value(&a.value, kind))
            .unwrap_or_default(),
    }
}

/// The markup of the node itself. For an attribute, `name="value"`.
pub(crate) fn outer_content(doc: &Document, node: NodeRef, kind: DocumentKind) -> String {
    match node {
        NodeRef::Node(id) => match kind {
            DocumentKind::Html => serial::outer_html(doc, id),
            DocumentKind::Xml => serial::outer_xml(doc, id),
        },
        NodeRef::Attribute { owner, index } => doc
            .attribute_at(owner, index)
            .map(|a| format!("{}=\"{}\"", a.qualified_name(), escape_value(&a.value, kind)))
            .unwrap_or_default(),
    }
}

fn escape_value(value: &str, kind: DocumentKind) -> String {
    match kind {
        DocumentKind::Html => serial::html::escape_attribute_value(value),
        DocumentKind::Xml => serial::xml::escape_attribute_value(value),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_element_content() {
        let doc = Document::parse_str("<r><a>x<b/></a></r>").unwrap();
        let a = doc.descendants(doc.root()).nth(1).unwrap();
        assert_eq!(inner_content(&doc, a.into(), DocumentKind::Xml), "x<b/>");
        assert_eq!(outer_content(&doc, a.into(), DocumentKind::Xml), "<a>x<b/></a>");
    }

    #[test]
    fn test_html_void_elements() {
        let doc = Document::parse_html("<p>a<br>b</p>");
        let p = doc
            .descendants(doc.root())
            .find(|&id| doc.node_name(id) == Some("p"))
            .unwrap();
        assert_eq!(inner_content(&doc, p.into(), DocumentKind::Html), "a<br>b");
    }

    #[test]
    fn test_attribute_content() {
        let doc = Document::parse_str(r#"<r title="a &amp; &quot;b&quot;"/>"#).unwrap();
        let title = NodeRef::Attribute {
            owner: doc.root_element().unwrap(),
            index: 0,
        };
        assert_eq!(inner_content(&doc, title, DocumentKind::Xml), "a &amp; &quot;b&quot;");
        assert_eq!(
            outer_content(&doc, title, DocumentKind::Xml),
            r#"title="a &amp; &quot;b&quot;""#
        );
    }
}
