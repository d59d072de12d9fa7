//! Error-tolerant HTML parser.
//!
//! The tree builder follows libxml2's `HTMLparser.c` rather than the HTML5
//! algorithm, so documents come out the way PHP's `DOMDocument::loadHTML`
//! shapes them:
//!
//! - Missing `html` and `body` elements are implied, and `head` is implied
//!   only for head content (`title`, `meta`, `script`, ...).
//! - Non-blank text outside any block container is wrapped in an implied `p`.
//! - Optional end tags (`p`, `li`, `td`, ...) are closed by the elements that
//!   cannot nest inside them.
//! - Tag and attribute names are lowercased; unquoted and boolean attributes
//!   are accepted.
//! - A DOCTYPE is added when the input has none.
//!
//! Parsing never fails. Real malformations (stray end tags, mismatched
//! required end tags, duplicate attributes, unterminated constructs) are
//! recorded in [`Document::diagnostics`] with libxml2's wording; implicit
//! closes the content model allows are not.
//!
//! # Examples
//!
//! ```
//! use elementfinder::html::parse_html;
//!
//! let doc = parse_html("<p>Hello <b>world</b>");
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("html"));
//! assert!(doc.diagnostics.is_empty());
//! ```

pub mod entities;

use crate::error::ErrorSeverity;
use crate::parser::input::{is_xml_char, normalize_newlines, ParserInput, DEFAULT_MAX_DEPTH};
use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// Public identifier of the DOCTYPE added to documents that lack one.
pub const DEFAULT_PUBLIC_ID: &str = "-//W3C//DTD HTML 4.0 Transitional//EN";
/// System identifier of the DOCTYPE added to documents that lack one.
pub const DEFAULT_SYSTEM_ID: &str = "http://www.w3.org/TR/REC-html40/loose.dtd";

/// Options controlling HTML parser behavior.
///
/// ```
/// use elementfinder::html::HtmlParseOptions;
///
/// let opts = HtmlParseOptions::default()
///     .no_blanks(true)
///     .no_implied(true);
/// assert!(!opts.no_default_doctype);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlParseOptions {
    /// Drop whitespace-only text nodes.
    pub no_blanks: bool,
    /// Do not add implied `html`, `head` and `body` elements.
    pub no_implied: bool,
    /// Do not add a DOCTYPE when the input has none.
    pub no_default_doctype: bool,
    /// Maximum element nesting depth.
    pub max_depth: u32,
}

impl Default for HtmlParseOptions {
    fn default() -> Self {
        Self {
            no_blanks: false,
            no_implied: false,
            no_default_doctype: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HtmlParseOptions {
    /// Enables or disables stripping of blank text nodes.
    #[must_use]
    pub fn no_blanks(mut self, yes: bool) -> Self {
        self.no_blanks = yes;
        self
    }

    /// Enables or disables generation of implied elements (html, head, body).
    #[must_use]
    pub fn no_implied(mut self, yes: bool) -> Self {
        self.no_implied = yes;
        self
    }

    /// Enables or disables the default DOCTYPE.
    #[must_use]
    pub fn no_default_doctype(mut self, yes: bool) -> Self {
        self.no_default_doctype = yes;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }
}

/// Parses an HTML string with default options.
#[must_use]
pub fn parse_html(input: &str) -> Document {
    parse_html_with_options(input, &HtmlParseOptions::default())
}

/// Parses an HTML string with the given options.
///
/// ```
/// use elementfinder::html::{parse_html_with_options, HtmlParseOptions};
///
/// let opts = HtmlParseOptions::default().no_blanks(true);
/// let doc = parse_html_with_options("<html> <body><p>Hi</p> </body></html>", &opts);
/// let html = doc.root_element().unwrap();
/// assert_eq!(doc.children(html).count(), 1);
/// ```
#[must_use]
pub fn parse_html_with_options(input: &str, options: &HtmlParseOptions) -> Document {
    let normalized = normalize_newlines(input);
    HtmlParser::new(&normalized, options).parse()
}

// --- Element classes ---

/// Returns true if the given tag name (lowercase) is a void element that
/// never has content or an end tag.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "basefont"
            | "br"
            | "col"
            | "embed"
            | "frame"
            | "hr"
            | "img"
            | "input"
            | "isindex"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Returns true if `name` is one of HTML 4's boolean attributes, which the
/// serializer writes as a bare name whatever their value.
pub(crate) fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "checked"
            | "compact"
            | "declare"
            | "defer"
            | "disabled"
            | "ismap"
            | "multiple"
            | "nohref"
            | "noresize"
            | "noshade"
            | "nowrap"
            | "readonly"
            | "selected"
    )
}

/// Returns true if `tag` is a raw text element whose content is not parsed
/// as markup.
pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Elements that imply a `head` when they appear before any body content.
fn is_head_content_element(tag: &str) -> bool {
    matches!(tag, "title" | "meta" | "link" | "base" | "style" | "script")
}

fn is_heading(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Elements whose end tag may be left out. Closing them implicitly is not
/// an error.
fn has_optional_end_tag(tag: &str) -> bool {
    matches!(
        tag,
        "html"
            | "head"
            | "body"
            | "p"
            | "li"
            | "dt"
            | "dd"
            | "option"
            | "optgroup"
            | "colgroup"
            | "thead"
            | "tbody"
            | "tfoot"
            | "tr"
            | "td"
            | "th"
    )
}

/// How hard an open element resists a stray end tag. An end tag never
/// closes an element with a higher priority than its own.
fn end_priority(tag: &str) -> u8 {
    match tag {
        "div" => 150,
        "td" | "th" => 160,
        "tr" => 170,
        "thead" | "tbody" | "tfoot" => 180,
        "table" => 190,
        "head" | "body" => 200,
        "html" => 220,
        _ => 100,
    }
}

/// Returns true if opening `tag` implicitly closes an open `open_tag`.
fn auto_closes(open_tag: &str, tag: &str) -> bool {
    match open_tag {
        "p" => {
            is_heading(tag)
                || matches!(
                    tag,
                    "p" | "address"
                        | "article"
                        | "aside"
                        | "blockquote"
                        | "center"
                        | "dd"
                        | "details"
                        | "dir"
                        | "div"
                        | "dl"
                        | "dt"
                        | "fieldset"
                        | "figcaption"
                        | "figure"
                        | "footer"
                        | "form"
                        | "header"
                        | "hr"
                        | "li"
                        | "listing"
                        | "main"
                        | "menu"
                        | "nav"
                        | "ol"
                        | "pre"
                        | "section"
                        | "summary"
                        | "table"
                        | "ul"
                        | "xmp"
                )
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => is_heading(tag),
        "li" => tag == "li",
        "dt" | "dd" => matches!(tag, "dt" | "dd"),
        "tr" => matches!(tag, "tr" | "thead" | "tbody" | "tfoot"),
        "td" | "th" => matches!(tag, "td" | "th" | "tr" | "thead" | "tbody" | "tfoot"),
        "thead" | "tbody" => matches!(tag, "tbody" | "tfoot"),
        "tfoot" => tag == "tbody",
        "option" => matches!(tag, "option" | "optgroup"),
        "optgroup" => tag == "optgroup",
        "colgroup" => matches!(tag, "colgroup" | "thead" | "tbody" | "tfoot" | "tr"),
        _ => false,
    }
}

// --- The HTML Parser ---

struct HtmlParser<'a> {
    input: ParserInput<'a>,
    doc: Document,
    options: &'a HtmlParseOptions,
    /// Open elements with their lowercase tag names, outermost first.
    open_elements: Vec<(NodeId, String)>,
    seen_head: bool,
    seen_body: bool,
    /// Misplaced `html`/`head`/`body` start tags whose end tags must be
    /// swallowed.
    discarded: u32,
    halted: bool,
}

impl<'a> HtmlParser<'a> {
    fn new(input: &'a str, options: &'a HtmlParseOptions) -> Self {
        let mut pi = ParserInput::new(input);
        pi.set_max_depth(options.max_depth);
        Self {
            input: pi,
            doc: Document::new(),
            options,
            open_elements: Vec::new(),
            seen_head: false,
            seen_body: false,
            discarded: 0,
            halted: false,
        }
    }

    fn parse(mut self) -> Document {
        if self.input.looking_at("\u{FEFF}") {
            self.input.advance(3);
        }
        self.input.skip_whitespace();

        // Comments and PIs may precede the DOCTYPE.
        loop {
            if self.input.looking_at("<!--") {
                self.parse_comment();
            } else if self.input.looking_at("<?") {
                self.parse_processing_instruction();
            } else {
                break;
            }
            self.input.skip_whitespace();
        }

        let mut has_doctype = false;
        if self.input.looking_at_ci("<!doctype") {
            self.parse_doctype();
            has_doctype = true;
        }

        self.parse_content();
        self.open_elements.clear();

        if !has_doctype && !self.options.no_default_doctype {
            let doctype = self.doc.create_node(NodeKind::DocumentType {
                name: "html".to_owned(),
                public_id: Some(DEFAULT_PUBLIC_ID.to_owned()),
                system_id: Some(DEFAULT_SYSTEM_ID.to_owned()),
                internal_subset: None,
            });
            let root = self.doc.root();
            self.doc.prepend_child(root, doctype);
        }

        self.doc.diagnostics = std::mem::take(&mut self.input.diagnostics);
        self.doc
    }

    fn error(&mut self, message: impl Into<String>) {
        self.input.push_diagnostic(ErrorSeverity::Error, message);
    }

    fn current_parent(&self) -> NodeId {
        self.open_elements
            .last()
            .map_or(self.doc.root(), |(id, _)| *id)
    }

    fn find_open(&self, tag: &str) -> Option<NodeId> {
        self.open_elements
            .iter()
            .find(|(_, t)| t == tag)
            .map(|(id, _)| *id)
    }

    fn is_in_body(&self) -> bool {
        self.find_open("body").is_some()
    }

    fn is_in_frameset(&self) -> bool {
        self.find_open("frameset").is_some()
    }

    // --- Implied elements ---

    /// Makes sure an `html` element is open, reopening an earlier one before
    /// creating a new one.
    fn ensure_html(&mut self) -> NodeId {
        if let Some(id) = self.find_open("html") {
            return id;
        }
        let root = self.doc.root();
        let existing = self
            .doc
            .children(root)
            .find(|&c| self.doc.node_name(c) == Some("html"));
        let id = existing.unwrap_or_else(|| {
            let id = self.doc.create_node(NodeKind::element("html"));
            self.doc.append_child(root, id);
            id
        });
        self.open_elements.insert(0, (id, "html".to_owned()));
        id
    }

    fn ensure_head(&mut self) -> NodeId {
        if let Some(id) = self.find_open("head") {
            return id;
        }
        let html = self.ensure_html();
        let id = self.doc.create_node(NodeKind::element("head"));
        self.doc.append_child(html, id);
        self.open_elements.push((id, "head".to_owned()));
        self.seen_head = true;
        id
    }

    fn ensure_body(&mut self) -> NodeId {
        if let Some(id) = self.find_open("body") {
            return id;
        }
        self.close_head_if_open();
        let html = self.ensure_html();
        let existing = if self.seen_body {
            self.doc
                .children(html)
                .find(|&c| self.doc.node_name(c) == Some("body"))
        } else {
            None
        };
        let id = existing.unwrap_or_else(|| {
            let id = self.doc.create_node(NodeKind::element("body"));
            self.doc.append_child(html, id);
            id
        });
        self.open_elements.push((id, "body".to_owned()));
        self.seen_body = true;
        id
    }

    fn close_head_if_open(&mut self) {
        if let Some(index) = self.open_elements.iter().rposition(|(_, t)| t == "head") {
            self.open_elements.truncate(index);
        }
    }

    /// Wraps stray character data in an implied `p`, the way libxml2's
    /// `htmlCheckParagraph` does.
    fn check_paragraph(&mut self) {
        let needs_paragraph = match self.open_elements.last() {
            None => true,
            Some((_, tag)) => tag == "html" || tag == "head",
        };
        if !needs_paragraph {
            return;
        }
        if !self.options.no_implied {
            self.ensure_body();
        }
        let parent = self.current_parent();
        let p = self.doc.create_node(NodeKind::element("p"));
        self.doc.append_child(parent, p);
        self.open_elements.push((p, "p".to_owned()));
    }

    // --- Content ---

    fn parse_content(&mut self) {
        while !self.input.at_end() && !self.halted {
            if self.input.looking_at("<!--") {
                self.parse_comment();
            } else if self.input.looking_at_ci("<!doctype") {
                self.error("Misplaced DOCTYPE declaration");
                self.skip_to_gt();
            } else if self.input.looking_at("<!") {
                self.error("Incorrectly opened comment");
                self.skip_to_gt();
            } else if self.input.looking_at("<?") {
                self.parse_processing_instruction();
            } else if self.input.looking_at("</")
                && self.input.peek_at(2).is_some_and(|b| b.is_ascii_alphabetic())
            {
                self.parse_end_tag();
            } else if self.input.peek() == Some(b'<')
                && self.input.peek_at(1).is_some_and(|b| b.is_ascii_alphabetic())
            {
                self.parse_start_tag();
            } else {
                self.parse_text();
            }
        }
    }

    // --- DOCTYPE ---

    fn parse_doctype(&mut self) {
        self.input.advance("<!doctype".len());
        self.input.skip_whitespace();
        let name = self
            .input
            .take_while(|b| !b.is_ascii_whitespace() && b != b'>')
            .to_owned();
        self.input.skip_whitespace();

        let mut public_id = None;
        let mut system_id = None;
        if self.input.looking_at_ci("public") {
            self.input.advance(6);
            self.input.skip_whitespace();
            public_id = self.try_parse_quoted_value();
            self.input.skip_whitespace();
            system_id = self.try_parse_quoted_value();
        } else if self.input.looking_at_ci("system") {
            self.input.advance(6);
            self.input.skip_whitespace();
            system_id = self.try_parse_quoted_value();
        }
        self.input.skip_whitespace();
        if self.input.peek() != Some(b'>') {
            self.error("DOCTYPE improperly terminated");
        }
        self.skip_to_gt();

        let node = self.doc.create_node(NodeKind::DocumentType {
            name: if name.is_empty() { "html".to_owned() } else { name },
            system_id,
            public_id,
            internal_subset: None,
        });
        let root = self.doc.root();
        self.doc.append_child(root, node);
    }

    // --- Start Tag ---

    fn parse_start_tag(&mut self) {
        self.input.advance(1);
        let name = self.parse_tag_name().to_ascii_lowercase();
        let attrs = self.parse_attributes();

        let (terminated, self_closing) = if self.input.looking_at("/>") {
            self.input.advance(2);
            (true, true)
        } else if self.input.peek() == Some(b'>') {
            self.input.advance(1);
            (true, false)
        } else {
            self.error(format!("Couldn't find end of Start Tag {name}"));
            (false, false)
        };

        match name.as_str() {
            "html" => {
                if let Some(html) = self.find_open("html") {
                    self.error("htmlParseStartTag: misplaced <html> tag");
                    self.merge_attributes(html, attrs);
                    self.discarded += 1;
                } else {
                    let html = if self.options.no_implied {
                        self.open_element("html", attrs)
                    } else {
                        let html = self.ensure_html();
                        self.merge_attributes(html, attrs);
                        html
                    };
                    if !terminated || self_closing {
                        self.pop_through(html);
                    }
                }
                return;
            }
            "head" => {
                if self.seen_head || self.seen_body || self.is_in_body() {
                    self.error("htmlParseStartTag: misplaced <head> tag");
                    self.discarded += 1;
                    return;
                }
                if !self.options.no_implied {
                    self.ensure_html();
                }
                let head = self.open_element("head", attrs);
                self.seen_head = true;
                if !terminated || self_closing {
                    self.pop_through(head);
                }
                return;
            }
            "body" => {
                if let Some(body) = self.find_open("body") {
                    self.error("htmlParseStartTag: misplaced <body> tag");
                    self.merge_attributes(body, attrs);
                    self.discarded += 1;
                    return;
                }
                self.close_head_if_open();
                if !self.options.no_implied {
                    self.ensure_html();
                }
                let body = self.open_element("body", attrs);
                self.seen_body = true;
                if !terminated || self_closing {
                    self.pop_through(body);
                }
                return;
            }
            _ => {}
        }

        self.handle_auto_close(&name);

        if !self.options.no_implied {
            if is_head_content_element(&name) && !self.is_in_body() && !self.is_in_frameset() {
                if self.find_open("head").is_none() {
                    if self.seen_head {
                        self.ensure_body();
                    } else {
                        self.ensure_head();
                    }
                }
            } else if matches!(name.as_str(), "frameset" | "frame" | "noframes") {
                self.close_head_if_open();
                self.ensure_html();
            } else if !self.is_in_body() && !self.is_in_frameset() {
                self.ensure_body();
            }
        }

        if u32::try_from(self.open_elements.len()).unwrap_or(u32::MAX) >= self.input.max_depth() {
            let max = self.input.max_depth();
            self.error(format!(
                "Excessive depth in document: {max} use XML_PARSE_HUGE option"
            ));
            self.halted = true;
            return;
        }

        let id = self.open_element(&name, attrs);
        if is_void_element(&name) || self_closing || !terminated {
            self.pop_through(id);
        } else if is_raw_text_element(&name) {
            self.parse_raw_text(&name);
        }
    }

    /// Creates an element under the current parent and pushes it.
    fn open_element(&mut self, name: &str, attrs: Vec<Attribute>) -> NodeId {
        let parent = self.current_parent();
        let id = self.doc.create_node(NodeKind::Element {
            name: name.to_owned(),
            prefix: None,
            namespace: None,
            attributes: attrs,
        });
        self.doc.append_child(parent, id);
        self.open_elements.push((id, name.to_owned()));
        id
    }

    /// Pops open elements up to and including `id`.
    fn pop_through(&mut self, id: NodeId) {
        if let Some(index) = self.open_elements.iter().rposition(|(open, _)| *open == id) {
            self.open_elements.truncate(index);
        }
    }

    /// Copies attributes from a repeated `html` or `body` start tag onto the
    /// existing element. Attributes already present win.
    fn merge_attributes(&mut self, elem_id: NodeId, attrs: Vec<Attribute>) {
        for attr in attrs {
            if self.doc.attribute(elem_id, &attr.name).is_none() {
                self.doc.set_attribute(elem_id, &attr.name, &attr.value);
            }
        }
    }

    fn handle_auto_close(&mut self, new_tag: &str) {
        while let Some((_, open)) = self.open_elements.last() {
            if !auto_closes(open, new_tag) {
                break;
            }
            self.open_elements.pop();
        }
    }

    // --- End Tag ---

    fn parse_end_tag(&mut self) {
        self.input.advance(2);
        let name = self.parse_tag_name().to_ascii_lowercase();
        self.input.skip_whitespace();
        if self.input.peek() == Some(b'>') {
            self.input.advance(1);
        } else {
            self.error("End tag : expected '>'");
            self.skip_to_gt();
        }

        if self.discarded > 0 && matches!(name.as_str(), "html" | "head" | "body") {
            self.discarded -= 1;
            return;
        }

        let Some(index) = self.open_elements.iter().rposition(|(_, t)| *t == name) else {
            self.error(format!("Unexpected end tag : {name}"));
            return;
        };

        let priority = end_priority(&name);
        if self.open_elements[index + 1..]
            .iter()
            .any(|(_, t)| end_priority(t) > priority)
        {
            let current = self
                .open_elements
                .last()
                .map(|(_, t)| t.clone())
                .unwrap_or_default();
            self.error(format!(
                "Opening and ending tag mismatch: {name} and {current}"
            ));
            return;
        }

        while self.open_elements.len() > index + 1 {
            if let Some((_, open)) = self.open_elements.pop() {
                if !has_optional_end_tag(&open) {
                    self.error(format!("Opening and ending tag mismatch: {name} and {open}"));
                }
            }
        }
        self.open_elements.pop();
    }

    // --- Attributes ---

    fn parse_attributes(&mut self) -> Vec<Attribute> {
        let mut attributes: Vec<Attribute> = Vec::new();

        loop {
            self.input.skip_whitespace();
            match self.input.peek() {
                None | Some(b'>' | b'<') => break,
                Some(b'/') => {
                    if self.input.looking_at("/>") {
                        break;
                    }
                    self.input.advance(1);
                    continue;
                }
                _ => {}
            }

            let name = self.parse_attr_name().to_ascii_lowercase();
            if name.is_empty() {
                // A stray quote or similar; skip it.
                self.input.next_char();
                continue;
            }

            self.input.skip_whitespace();
            let value = if self.input.peek() == Some(b'=') {
                self.input.advance(1);
                self.input.skip_whitespace();
                self.parse_attr_value()
            } else {
                // Boolean attribute: the value is the name.
                name.clone()
            };

            if attributes.iter().any(|a| a.name == name) {
                self.error(format!("Attribute {name} redefined"));
            } else {
                attributes.push(Attribute::new(name, value));
            }
        }

        attributes
    }

    fn parse_attr_name(&mut self) -> &'a str {
        let rest = self.input.remaining();
        let end = rest
            .find(|c: char| {
                c.is_ascii_whitespace() || matches!(c, '=' | '>' | '/' | '<' | '"' | '\'')
            })
            .unwrap_or(rest.len());
        self.input.advance(end);
        &rest[..end]
    }

    fn parse_attr_value(&mut self) -> String {
        let mut value = String::new();
        match self.input.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.input.advance(1);
                loop {
                    match self.input.peek() {
                        None => {
                            let q = quote as char;
                            self.error(format!("AttValue: {q} expected"));
                            break;
                        }
                        Some(b) if b == quote => {
                            self.input.advance(1);
                            break;
                        }
                        Some(b'&') => self.push_attr_reference(&mut value),
                        Some(_) => {
                            if let Some(c) = self.input.next_char() {
                                value.push(c);
                            }
                        }
                    }
                }
            }
            _ => {
                while let Some(b) = self.input.peek() {
                    if b.is_ascii_whitespace() || b == b'>' || b == b'<' {
                        break;
                    }
                    if b == b'&' {
                        self.push_attr_reference(&mut value);
                    } else if let Some(c) = self.input.next_char() {
                        value.push(c);
                    }
                }
            }
        }
        value
    }

    /// Attribute values decode references but keep a bare `&` silently.
    fn push_attr_reference(&mut self, value: &mut String) {
        let starts_reference = self
            .input
            .peek_at(1)
            .is_some_and(|b| b == b'#' || b.is_ascii_alphanumeric());
        if starts_reference {
            let resolved = self.parse_html_reference();
            value.push_str(&resolved);
        } else {
            self.input.advance(1);
            value.push('&');
        }
    }

    // --- Text Content ---

    fn parse_text(&mut self) {
        let mut text = String::new();
        if self.input.peek() == Some(b'<') {
            // A `<` that starts no markup is kept as character data.
            self.error("htmlParseStartTag: invalid element name");
            self.input.advance(1);
            text.push('<');
        }
        loop {
            match self.input.peek() {
                None | Some(b'<') => break,
                Some(b'&') => {
                    let resolved = self.parse_html_reference();
                    text.push_str(&resolved);
                }
                Some(_) => {
                    let rest = self.input.remaining();
                    let end = rest.find(['<', '&']).unwrap_or(rest.len());
                    text.push_str(&rest[..end]);
                    self.input.advance(end);
                }
            }
        }
        self.add_text(&text);
    }

    fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let blank = text.bytes().all(|b| b.is_ascii_whitespace());
        if blank {
            if self.options.no_blanks || self.open_elements.is_empty() {
                return;
            }
        } else {
            self.check_paragraph();
        }
        let parent = self.current_parent();
        self.append_text(parent, text);
    }

    fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(last) = self.doc.last_child(parent) {
            if let NodeKind::Text { content } = &mut self.doc.node_mut(last).kind {
                content.push_str(text);
                return;
            }
        }
        let node = self.doc.create_node(NodeKind::text(text));
        self.doc.append_child(parent, node);
    }

    // --- Raw text (script/style) ---

    /// Reads the body of a `script` or `style` element verbatim. The end tag
    /// itself is left for `parse_content`.
    fn parse_raw_text(&mut self, tag: &str) {
        let rest = self.input.remaining();
        let close = format!("</{tag}");
        let end = rest
            .as_bytes()
            .windows(close.len())
            .position(|w| w.eq_ignore_ascii_case(close.as_bytes()))
            .unwrap_or(rest.len());
        if end > 0 {
            let parent = self.current_parent();
            let node = self.doc.create_node(NodeKind::text(&rest[..end]));
            self.doc.append_child(parent, node);
        }
        self.input.advance(end);
    }

    // --- Comments ---

    fn parse_comment(&mut self) {
        self.input.advance(4);
        let content = if self.input.peek() == Some(b'>') {
            // `<!-->`
            self.input.advance(1);
            ""
        } else if self.input.looking_at("->") {
            self.input.advance(2);
            ""
        } else {
            let rest = self.input.remaining();
            let end = [rest.find("-->").map(|i| (i, 3)), rest.find("--!>").map(|i| (i, 4))]
                .into_iter()
                .flatten()
                .min_by_key(|(i, _)| *i);
            let Some((at, len)) = end else {
                self.error("Comment not terminated");
                self.input.advance(rest.len());
                return;
            };
            self.input.advance(at + len);
            &rest[..at]
        };
        let parent = self.current_parent();
        let node = self.doc.create_node(NodeKind::Comment {
            content: content.to_owned(),
        });
        self.doc.append_child(parent, node);
    }

    // --- Processing Instructions ---

    /// HTML processing instructions end at the first `>`.
    fn parse_processing_instruction(&mut self) {
        self.input.advance(2);
        let target = self
            .input
            .take_while(|b| !b.is_ascii_whitespace() && b != b'>')
            .to_owned();
        if target.is_empty() {
            self.error("htmlParsePI : no target name");
            self.skip_to_gt();
            return;
        }
        self.input.skip_whitespace();
        let data = match self.input.take_until(">") {
            Ok(data) => data,
            Err(data) => {
                self.error(format!("ParsePI: PI {target} never end ..."));
                data
            }
        };
        let parent = self.current_parent();
        let node = self.doc.create_node(NodeKind::ProcessingInstruction {
            target,
            data: (!data.is_empty()).then(|| data.to_owned()),
        });
        self.doc.append_child(parent, node);
    }

    // --- HTML Entity/Character References ---

    /// Parses a reference at `&`. Anything that does not decode comes back
    /// as the literal text that was consumed.
    fn parse_html_reference(&mut self) -> String {
        let saved = self.input.save_position();
        self.input.advance(1);

        if self.input.peek() == Some(b'#') {
            self.input.advance(1);
            let hex = matches!(self.input.peek(), Some(b'x' | b'X'));
            if hex {
                self.input.advance(1);
            }
            let digits = if hex {
                self.input.take_while(|b| b.is_ascii_hexdigit())
            } else {
                self.input.take_while(|b| b.is_ascii_digit())
            };
            if digits.is_empty() {
                self.error("htmlParseCharRef: invalid value");
                self.input.restore_position(saved);
                self.input.advance(1);
                return "&".to_owned();
            }
            if self.input.peek() == Some(b';') {
                self.input.advance(1);
            } else {
                self.error("htmlParseCharRef: missing semicolon");
            }
            let value = u32::from_str_radix(digits, if hex { 16 } else { 10 }).ok();
            return match value.and_then(char::from_u32).filter(|&c| is_xml_char(c)) {
                Some(c) => c.to_string(),
                None => {
                    let shown = value.map_or_else(|| digits.to_owned(), |v| v.to_string());
                    self.error(format!("htmlParseCharRef: invalid xmlChar value {shown}"));
                    String::new()
                }
            };
        }

        let name = self.parse_tag_name();
        if name.is_empty() {
            self.error("htmlParseEntityRef: no name");
            return "&".to_owned();
        }
        if self.input.peek() != Some(b';') {
            self.error("htmlParseEntityRef: expecting ';'");
            return format!("&{name}");
        }
        self.input.advance(1);
        match entities::lookup_entity(name) {
            Some(c) => c.to_string(),
            // Unknown entities stay as written.
            None => format!("&{name};"),
        }
    }

    // --- Low-level helpers ---

    /// Letters, digits and `-_:.`.
    fn parse_tag_name(&mut self) -> &'a str {
        self.input
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.'))
    }

    fn try_parse_quoted_value(&mut self) -> Option<String> {
        match self.input.parse_quoted()? {
            Ok(value) => Some(value.to_owned()),
            Err(value) => {
                self.error("Unfinished PubidLiteral");
                Some(value.to_owned())
            }
        }
    }

    fn skip_to_gt(&mut self) {
        let _ = self.input.take_until(">");
    }
}
