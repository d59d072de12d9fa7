//! Markup serialization.
//!
//! Both serializers write a node exactly as it sits in the tree, with no
//! pretty-printing and no XML declaration, so the output of `inner_*` can be
//! parsed again into an equivalent fragment. Text is written as UTF-8; only
//! markup-significant characters are escaped.

pub mod html;
pub mod xml;

pub use html::{inner_html, outer_html};
pub use xml::{inner_xml, outer_xml};

/// Writes a `<!DOCTYPE ...>` declaration without a trailing newline.
fn write_doctype(
    out: &mut String,
    name: &str,
    public_id: Option<&str>,
    system_id: Option<&str>,
) {
    out.push_str("<!DOCTYPE ");
    out.push_str(name);
    match (public_id, system_id) {
        (Some(pub_id), Some(sys_id)) => {
            out.push_str(" PUBLIC \"");
            out.push_str(pub_id);
            out.push_str("\" \"");
            out.push_str(sys_id);
            out.push('"');
        }
        (Some(pub_id), None) => {
            out.push_str(" PUBLIC \"");
            out.push_str(pub_id);
            out.push('"');
        }
        (None, Some(sys_id)) => {
            out.push_str(" SYSTEM \"");
            out.push_str(sys_id);
            out.push('"');
        }
        (None, None) => {}
    }
}
