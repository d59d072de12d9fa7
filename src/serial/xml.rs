//! XML serializer.
//!
//! Follows libxml2's `xmlNodeDump` with formatting off: elements without
//! children are written as `<a/>`, text escapes `<`, `>`, `&` and `\r`,
//! attribute values additionally escape `"` and whitespace control
//! characters so they survive attribute-value normalization.

use crate::tree::{Document, NodeId, NodeKind};

use super::write_doctype;

/// Serializes a node with its own markup.
///
/// # Examples
///
/// ```
/// use elementfinder::tree::Document;
/// use elementfinder::serial::outer_xml;
///
/// let doc = Document::parse_str("<a><b x=\"1\"/>t</a>").unwrap();
/// let a = doc.root_element().unwrap();
/// assert_eq!(outer_xml(&doc, a), "<a><b x=\"1\"/>t</a>");
/// ```
#[must_use]
pub fn outer_xml(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Serializes the children of a node, concatenated.
///
/// For a document node this is every top-level node (DOCTYPE, comments,
/// the root element) written back to back.
#[must_use]
pub fn inner_xml(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for child in doc.children(id) {
        write_node(doc, child, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.node(id).kind {
        NodeKind::Element {
            name,
            prefix,
            attributes,
            ..
        } => {
            out.push('<');
            if let Some(pfx) = prefix {
                out.push_str(pfx);
                out.push(':');
            }
            out.push_str(name);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.qualified_name());
                out.push_str("=\"");
                write_escaped_attr(out, &attr.value);
                out.push('"');
            }
            if doc.first_child(id).is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            if let Some(pfx) = prefix {
                out.push_str(pfx);
                out.push(':');
            }
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text { content } => write_escaped_text(out, content),
        NodeKind::CData { content } => {
            out.push_str("<![CDATA[");
            out.push_str(content);
            out.push_str("]]>");
        }
        NodeKind::Comment { content } => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(d) = data {
                out.push(' ');
                out.push_str(d);
            }
            out.push_str("?>");
        }
        NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            internal_subset,
        } => {
            write_doctype(out, name, public_id.as_deref(), system_id.as_deref());
            if let Some(subset) = internal_subset {
                out.push_str(" [");
                out.push_str(subset);
                out.push(']');
            }
            out.push('>');
        }
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
    }
}

fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value the way it appears between quotes.
#[must_use]
pub fn escape_attribute_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    write_escaped_attr(&mut out, value);
    out
}
