//! HTML serializer.
//!
//! Mirrors libxml2's `htmlNodeDump` with formatting off:
//!
//! - Void elements (`<br>`, `<img>`) get no end tag and no `/>`.
//! - Other elements always get an end tag, even when empty.
//! - `script` and `style` bodies are written verbatim.
//! - Boolean attributes (`checked`, `selected`, ...) are written bare.
//! - PIs end with `>`, not `?>`.

use crate::html::{is_boolean_attribute, is_raw_text_element, is_void_element};
use crate::tree::{Document, NodeId, NodeKind};

use super::write_doctype;

/// Serializes a node with its own markup.
///
/// # Examples
///
/// ```
/// use elementfinder::html::parse_html;
/// use elementfinder::serial::outer_html;
///
/// let doc = parse_html("<p>a<br>b</p>");
/// let html = doc.root_element().unwrap();
/// assert_eq!(outer_html(&doc, html), "<html><body><p>a<br>b</p></body></html>");
/// ```
#[must_use]
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Serializes the children of a node, concatenated.
#[must_use]
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let raw = doc.node_name(id).is_some_and(is_raw_text_element);
    for child in doc.children(id) {
        write_child(doc, child, raw, &mut out);
    }
    out
}

fn write_child(doc: &Document, child: NodeId, raw_parent: bool, out: &mut String) {
    match &doc.node(child).kind {
        NodeKind::Text { content } if raw_parent => out.push_str(content),
        _ => write_node(doc, child, out),
    }
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
                let qualified = attr.qualified_name();
                out.push(' ');
                out.push_str(&qualified);
                if attr.prefix.is_some() || !is_boolean_attribute(&attr.name) {
                    out.push_str("=\"");
                    write_escaped_attr(out, &attr.value);
                    out.push('"');
                }
            }
            out.push('>');

            if is_void_element(name) && doc.first_child(id).is_none() {
                return;
            }

            let raw = is_raw_text_element(name);
            for child in doc.children(id) {
                write_child(doc, child, raw, out);
            }

            out.push_str("</");
            if let Some(pfx) = prefix {
                out.push_str(pfx);
                out.push(':');
            }
            out.push_str(name);
            out.push('>');
        }
        NodeKind::Text { content } | NodeKind::CData { content } => {
            write_escaped_text(out, content);
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
            out.push('>');
        }
        NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            ..
        } => {
            write_doctype(out, name, public_id.as_deref(), system_id.as_deref());
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::html::parse_html;
    use pretty_assertions::assert_eq;

    fn body_inner(input: &str) -> String {
        let doc = parse_html(input);
        let body = doc
            .descendants(doc.root())
            .find(|&n| doc.node_name(n) == Some("body"))
            .unwrap();
        inner_html(&doc, body)
    }

    #[test]
    fn test_implied_paragraph_markup() {
        let doc = parse_html("   0 ");
        let html = doc.root_element().unwrap();
        assert_eq!(inner_html(&doc, html), "<body><p>0 </p></body>");
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        assert_eq!(
            body_inner("<img src=\"a.png\"><br/><hr>"),
            "<img src=\"a.png\"><br><hr>"
        );
    }

    #[test]
    fn test_empty_non_void_element_keeps_end_tag() {
        assert_eq!(body_inner("<div></div><p/>"), "<div></div><p></p>");
    }

    #[test]
    fn test_script_not_escaped() {
        let doc = parse_html("<script>if (a < b && c) {}</script>");
        let script = doc
            .descendants(doc.root())
            .find(|&n| doc.node_name(n) == Some("script"))
            .unwrap();
        assert_eq!(outer_html(&doc, script), "<script>if (a < b && c) {}</script>");
        assert_eq!(inner_html(&doc, script), "if (a < b && c) {}");
    }

    #[test]
    fn test_boolean_attribute_written_bare() {
        assert_eq!(
            body_inner("<input type=checkbox checked>"),
            "<input type=\"checkbox\" checked>"
        );
        assert_eq!(
            body_inner("<select multiple=multiple><option selected=\"yes\">a</option></select>"),
            "<select multiple><option selected>a</option></select>"
        );
    }

    #[test]
    fn test_attribute_named_like_its_value_keeps_value() {
        assert_eq!(
            body_inner("<input type=\"text\" name=\"name\"><a title=\"title\">x</a>"),
            "<input type=\"text\" name=\"name\"><a title=\"title\">x</a>"
        );
    }

    #[test]
    fn test_text_and_attribute_escaping() {
        assert_eq!(
            body_inner("<a title='say \"hi\" &amp; go'>1 &lt; 2</a>"),
            "<a title=\"say &quot;hi&quot; &amp; go\">1 &lt; 2</a>"
        );
    }

    #[test]
    fn test_comment_and_pi() {
        assert_eq!(
            body_inner("<div><!-- c --><?php x ?></div>"),
            "<div><!-- c --><?php x ?></div>"
        );
    }

    #[test]
    fn test_document_inner_includes_doctype() {
        let doc = parse_html("<p>x</p>");
        assert_eq!(
            inner_html(&doc, doc.root()),
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.0 Transitional//EN\" \
             \"http://www.w3.org/TR/REC-html40/loose.dtd\"><html><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn test_valueless_attribute_gets_its_name_as_value() {
        let doc = parse_html("<html data-document-is-empty></html>");
        let html = doc.root_element().unwrap();
        assert_eq!(
            outer_html(&doc, html),
            "<html data-document-is-empty=\"data-document-is-empty\"></html>"
        );
    }
}
