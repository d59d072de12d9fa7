//! Recovering XML 1.0 parser state machine.
//!
//! The parser walks the input once, building the tree as it goes. Every
//! well-formedness problem is recorded as a `Fatal` diagnostic and the parser
//! picks the recovery libxml2 uses in recovery mode: a mismatched end tag
//! closes the current element, content after the root element stops the
//! parse, unclosed elements are closed at end of input.

use std::collections::HashMap;

use crate::error::ErrorSeverity;
use crate::tree::{Attribute, Document, NodeId, NodeKind, XMLNS_NAMESPACE};

use super::input::{is_xml_char, split_name, NamespaceResolver, ParserInput};
use super::ParseOptions;


/// An element whose end tag has not been seen yet.
struct OpenElement {
    id: NodeId,
    /// Qualified name as written, for end-tag matching.
    name: String,
    /// Line of the start tag, quoted in mismatch messages.
    line: u32,
    /// Whether the start tag opened a namespace scope.
    ns_scope: bool,
}

pub(crate) struct XmlParser<'a> {
    input: ParserInput<'a>,
    doc: Document,
    options: &'a ParseOptions,
    ns: NamespaceResolver,
    /// General entities declared in the internal subset.
    entities: HashMap<String, String>,
    open: Vec<OpenElement>,
    root_seen: bool,
    halted: bool,
}

impl<'a> XmlParser<'a> {
    pub fn new(input: &'a str, options: &'a ParseOptions) -> Self {
        let mut pi = ParserInput::new(input);
        pi.set_max_depth(options.max_depth);
        Self {
            input: pi,
            doc: Document::new(),
            options,
            ns: NamespaceResolver::new(),
            entities: HashMap::new(),
            open: Vec::new(),
            root_seen: false,
            halted: false,
        }
    }

    /// Parses the whole input and returns the tree with its diagnostics.
    pub fn parse(mut self) -> Document {
        if self.input.looking_at("\u{FEFF}") {
            self.input.advance(3);
        }

        if self.input.remaining().trim().is_empty() {
            self.error("Document is empty");
        } else {
            if self.at_xml_decl() {
                self.parse_xml_declaration();
            }
            self.parse_prolog();
            if self.input.at_start_tag() {
                self.parse_content();
            } else if !self.halted {
                self.error("Start tag expected, '<' not found");
            }
        }

        while let Some(open) = self.open.pop() {
            self.error(format!(
                "Premature end of data in tag {} line {}",
                open.name, open.line
            ));
        }

        self.doc.diagnostics = std::mem::take(&mut self.input.diagnostics);
        self.doc
    }

    fn error(&mut self, message: impl Into<String>) {
        self.input.push_diagnostic(ErrorSeverity::Fatal, message);
    }

    fn current_parent(&self) -> NodeId {
        self.open.last().map_or(self.doc.root(), |e| e.id)
    }

    // --- XML declaration ---

    fn at_xml_decl(&self) -> bool {
        self.input.looking_at("<?xml")
            && matches!(self.input.peek_at(5), Some(b' ' | b'\t' | b'\n' | b'\r'))
    }

    fn parse_xml_declaration(&mut self) {
        self.input.advance(5);
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at("?>") {
                self.input.advance(2);
                break;
            }
            let Some(key) = self.input.parse_name() else {
                self.error("parsing XML declaration: '?>' expected");
                let _ = self.input.take_until("?>");
                break;
            };
            self.input.skip_whitespace();
            if self.input.peek() == Some(b'=') {
                self.input.advance(1);
                self.input.skip_whitespace();
            }
            let Some(Ok(value)) = self.input.parse_quoted() else {
                self.error(format!("String not started expecting ' or \" in {key}"));
                let _ = self.input.take_until("?>");
                break;
            };
            match key {
                "version" => self.doc.version = Some(value.to_owned()),
                "encoding" => self.doc.encoding = Some(value.to_owned()),
                "standalone" => self.doc.standalone = Some(value == "yes"),
                _ => self.error(format!("Unsupported XML declaration attribute {key}")),
            }
        }
        if self.doc.version.is_none() {
            self.error("Malformed declaration expecting version");
        }
    }

    // --- Prolog and epilogue ---

    fn parse_prolog(&mut self) {
        let root = self.doc.root();
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at("<!--") {
                self.parse_comment(root);
            } else if self.input.looking_at("<?") {
                self.parse_pi(root);
            } else if self.input.looking_at("<!DOCTYPE") {
                self.parse_doctype();
            } else {
                break;
            }
        }
    }

    /// Handles what follows the root element. Returns `false` when parsing
    /// has to stop.
    fn parse_epilogue_item(&mut self) -> bool {
        let root = self.doc.root();
        self.input.skip_whitespace();
        if self.input.at_end() {
            return false;
        }
        if self.input.looking_at("<!--") {
            self.parse_comment(root);
        } else if self.input.looking_at("<?") {
            self.parse_pi(root);
        } else {
            self.error("Extra content at the end of the document");
            self.halted = true;
            return false;
        }
        true
    }

    // --- DOCTYPE ---

    fn parse_doctype(&mut self) {
        self.input.advance("<!DOCTYPE".len());
        self.input.skip_whitespace();
        let name = match self.input.parse_name() {
            Some(name) => name.to_owned(),
            None => {
                self.error("xmlParseDocTypeDecl : no DOCTYPE name !");
                String::new()
            }
        };
        self.input.skip_whitespace();

        let mut public_id = None;
        let mut system_id = None;
        if self.input.looking_at("PUBLIC") {
            self.input.advance(6);
            self.input.skip_whitespace();
            public_id = self.literal("PubidLiteral");
            self.input.skip_whitespace();
            system_id = self.literal("SystemLiteral");
        } else if self.input.looking_at("SYSTEM") {
            self.input.advance(6);
            self.input.skip_whitespace();
            system_id = self.literal("SystemLiteral");
        }
        self.input.skip_whitespace();

        let mut internal_subset = None;
        if self.input.peek() == Some(b'[') {
            self.input.advance(1);
            let subset = self.scan_internal_subset();
            self.declare_entities(subset);
            internal_subset = Some(subset.to_owned());
            self.input.skip_whitespace();
        }

        if self.input.peek() == Some(b'>') {
            self.input.advance(1);
        } else {
            self.error("DOCTYPE improperly terminated");
            let _ = self.input.take_until(">");
        }

        let root = self.doc.root();
        let node = self.doc.create_node(NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            internal_subset,
        });
        self.doc.append_child(root, node);
    }

    fn literal(&mut self, what: &str) -> Option<String> {
        match self.input.parse_quoted() {
            Some(Ok(value)) => Some(value.to_owned()),
            Some(Err(_)) => {
                self.error(format!("Unfinished {what}"));
                None
            }
            None => None,
        }
    }

    /// Consumes the internal subset up to its closing `]`, skipping quoted
    /// literals and comments.
    fn scan_internal_subset(&mut self) -> &'a str {
        let start = self.input.pos();
        loop {
            match self.input.peek() {
                None => {
                    self.error("xmlParseInternalSubset: error detected in Markup declaration");
                    return self.input.slice(start, self.input.pos());
                }
                Some(b']') => {
                    let subset = self.input.slice(start, self.input.pos());
                    self.input.advance(1);
                    return subset;
                }
                Some(b'"' | b'\'') => {
                    let _ = self.input.parse_quoted();
                }
                Some(_) if self.input.looking_at("<!--") => {
                    self.input.advance(4);
                    let _ = self.input.take_until("-->");
                }
                Some(_) => self.input.advance(1),
            }
        }
    }

    /// Records internal general entity declarations. The first declaration
    /// of a name wins; parameter and external entities are ignored.
    fn declare_entities(&mut self, subset: &str) {
        let mut cursor = ParserInput::new(subset);
        while cursor.take_until("<!ENTITY").is_ok() {
            cursor.skip_whitespace();
            if cursor.peek() == Some(b'%') {
                continue;
            }
            let Some(name) = cursor.parse_name() else {
                continue;
            };
            cursor.skip_whitespace();
            if let Some(Ok(value)) = cursor.parse_quoted() {
                self.entities
                    .entry(name.to_owned())
                    .or_insert_with(|| expand_entity_value(value));
            }
        }
    }

    // --- Content ---

    fn parse_content(&mut self) {
        while !self.halted && !self.input.at_end() {
            if self.open.is_empty() && self.root_seen {
                if !self.parse_epilogue_item() {
                    break;
                }
                continue;
            }
            let parent = self.current_parent();
            if self.input.looking_at("</") {
                self.parse_end_tag();
            } else if self.input.looking_at("<!--") {
                self.parse_comment(parent);
            } else if self.input.looking_at("<![CDATA[") {
                self.parse_cdata(parent);
            } else if self.input.looking_at("<?") {
                self.parse_pi(parent);
            } else if self.input.at_start_tag() {
                self.parse_start_tag(parent);
            } else if self.input.peek() == Some(b'<') {
                self.error("StartTag: invalid element name");
                self.input.advance(1);
                self.append_text(parent, "<");
            } else if self.input.peek() == Some(b'&') {
                let text = self.parse_reference();
                self.append_text(parent, &text);
            } else {
                self.parse_char_data(parent);
            }
        }
    }

    fn parse_char_data(&mut self, parent: NodeId) {
        let start = self.input.pos();
        while let Some(b) = self.input.peek() {
            if b == b'<' || b == b'&' {
                break;
            }
            self.input.advance(1);
        }
        let raw = self.input.slice(start, self.input.pos());

        if raw.contains("]]>") {
            self.error("Sequence ']]>' not allowed in content");
        }
        if self.options.no_blanks && raw.bytes().all(|b| b.is_ascii_whitespace()) {
            return;
        }
        if let Some(bad) = raw.chars().find(|&c| !is_xml_char(c)) {
            self.error(format!("PCDATA invalid Char value {}", bad as u32));
            let cleaned: String = raw.chars().filter(|&c| is_xml_char(c)).collect();
            self.append_text(parent, &cleaned);
        } else {
            self.append_text(parent, raw);
        }
    }

    /// Appends text to `parent`, merging with a trailing text node.
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.doc.last_child(parent) {
            if let NodeKind::Text { content } = &mut self.doc.node_mut(last).kind {
                content.push_str(text);
                return;
            }
        }
        let node = self.doc.create_node(NodeKind::text(text));
        self.doc.append_child(parent, node);
    }

    // --- References ---

    /// Parses a character or entity reference at the cursor and returns its
    /// replacement text. Malformed references come back as literal text.
    fn parse_reference(&mut self) -> String {
        self.input.advance(1);
        if self.input.peek() == Some(b'#') {
            self.input.advance(1);
            let hex = self.input.peek() == Some(b'x');
            if hex {
                self.input.advance(1);
            }
            let digits = if hex {
                self.input.take_while(|b| b.is_ascii_hexdigit())
            } else {
                self.input.take_while(|b| b.is_ascii_digit())
            };
            if digits.is_empty() || self.input.peek() != Some(b';') {
                self.error(if hex {
                    "xmlParseCharRef: invalid hexadecimal value"
                } else {
                    "xmlParseCharRef: invalid decimal value"
                });
                return String::new();
            }
            self.input.advance(1);
            let code = u32::from_str_radix(digits, if hex { 16 } else { 10 }).unwrap_or(0);
            return match char::from_u32(code).filter(|&c| is_xml_char(c)) {
                Some(c) => c.to_string(),
                None => {
                    self.error(format!("xmlParseCharRef: invalid xmlChar value {code}"));
                    String::new()
                }
            };
        }

        let Some(name) = self.input.parse_name() else {
            self.error("xmlParseEntityRef: no name");
            return "&".to_owned();
        };
        if self.input.peek() != Some(b';') {
            self.error("EntityRef: expecting ';'");
            return format!("&{name}");
        }
        self.input.advance(1);
        match predefined_entity(name) {
            Some(c) => c.to_owned(),
            None => {
                if let Some(value) = self.entities.get(name) {
                    return value.clone();
                }
                self.error(format!("Entity '{name}' not defined"));
                String::new()
            }
        }
    }

    // --- Elements ---

    fn parse_start_tag(&mut self, parent: NodeId) {
        let line = self.input.line();
        self.input.advance(1);
        let qname = self.input.parse_name().unwrap_or_default();

        let mut raw_attrs: Vec<(&'a str, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            let had_ws = self.input.skip_whitespace();
            match self.input.peek() {
                None => {
                    self.error(format!("Couldn't find end of Start Tag {qname} line {line}"));
                    break;
                }
                Some(b'>') => {
                    self.input.advance(1);
                    break;
                }
                Some(b'/') if self.input.peek_at(1) == Some(b'>') => {
                    self.input.advance(2);
                    self_closing = true;
                    break;
                }
                _ => {}
            }
            let Some(attr_name) = self.input.parse_name() else {
                self.error("attributes construct error");
                if self.input.take_until(">").is_err() {
                    self.error(format!("Couldn't find end of Start Tag {qname} line {line}"));
                }
                break;
            };
            if !had_ws {
                self.error("attributes construct error");
            }
            self.input.skip_whitespace();
            if self.input.peek() != Some(b'=') {
                self.error(format!(
                    "Specification mandates value for attribute {attr_name}"
                ));
                continue;
            }
            self.input.advance(1);
            self.input.skip_whitespace();
            let Some(value) = self.parse_att_value() else {
                self.error("AttValue: \" or ' expected");
                self.input
                    .take_while(|b| !b.is_ascii_whitespace() && b != b'>' && b != b'/');
                continue;
            };
            if raw_attrs.iter().any(|(n, _)| *n == attr_name) {
                self.error(format!("Attribute {attr_name} redefined"));
            } else {
                raw_attrs.push((attr_name, value));
            }
        }

        let ns_scope = raw_attrs
            .iter()
            .any(|(n, _)| *n == "xmlns" || n.starts_with("xmlns:"));
        if ns_scope {
            self.ns.push_scope();
            for (name, value) in &raw_attrs {
                if *name == "xmlns" {
                    self.ns.bind(None, value);
                } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                    self.ns.bind(Some(prefix), value);
                }
            }
        }

        let (prefix, local) = split_name(qname);
        let namespace = self.ns.resolve(prefix).map(str::to_owned);
        if let (Some(p), None) = (prefix, &namespace) {
            self.input.push_diagnostic(
                ErrorSeverity::Error,
                format!("Namespace prefix {p} on {local} is not defined"),
            );
        }

        let mut attributes = Vec::with_capacity(raw_attrs.len());
        for (name, value) in raw_attrs {
            let (attr_prefix, attr_local) = split_name(name);
            let attr_ns = if name == "xmlns" || attr_prefix == Some("xmlns") {
                Some(XMLNS_NAMESPACE.to_owned())
            } else if let Some(p) = attr_prefix {
                let resolved = self.ns.resolve(Some(p)).map(str::to_owned);
                if resolved.is_none() {
                    self.input.push_diagnostic(
                        ErrorSeverity::Error,
                        format!("Namespace prefix {p} for {attr_local} on {local} is not defined"),
                    );
                }
                resolved
            } else {
                None
            };
            attributes.push(Attribute {
                name: attr_local.to_owned(),
                value,
                prefix: attr_prefix.map(str::to_owned),
                namespace: attr_ns,
            });
        }

        let id = self.doc.create_node(NodeKind::Element {
            name: local.to_owned(),
            prefix: prefix.map(str::to_owned),
            namespace,
            attributes,
        });
        self.doc.append_child(parent, id);
        self.root_seen = true;

        if !self.input.increment_depth() {
            self.error(format!(
                "Excessive depth in document: {} use XML_PARSE_HUGE option",
                self.input.max_depth()
            ));
            self.halted = true;
        }

        if self_closing {
            self.input.decrement_depth();
            if ns_scope {
                self.ns.pop_scope();
            }
        } else {
            self.open.push(OpenElement {
                id,
                name: qname.to_owned(),
                line,
                ns_scope,
            });
        }
    }

    fn parse_att_value(&mut self) -> Option<String> {
        let quote = match self.input.peek() {
            Some(q @ (b'"' | b'\'')) => q,
            _ => return None,
        };
        self.input.advance(1);
        let mut value = String::new();
        loop {
            match self.input.peek() {
                None => {
                    self.error(format!("AttValue: {} expected", quote as char));
                    break;
                }
                Some(b) if b == quote => {
                    self.input.advance(1);
                    break;
                }
                Some(b'&') => {
                    let text = self.parse_reference();
                    value.push_str(&text);
                }
                Some(b'<') => {
                    self.error("Unescaped '<' not allowed in attributes values");
                    self.input.advance(1);
                    value.push('<');
                }
                Some(b'\n' | b'\t' | b'\r') => {
                    self.input.advance(1);
                    value.push(' ');
                }
                Some(_) => {
                    if let Some(c) = self.input.next_char() {
                        value.push(c);
                    }
                }
            }
        }
        Some(value)
    }

    fn parse_end_tag(&mut self) {
        self.input.advance(2);
        let name = self.input.parse_name().unwrap_or_default();
        self.input.skip_whitespace();
        if self.input.peek() == Some(b'>') {
            self.input.advance(1);
        } else {
            self.error("expected '>'");
            let _ = self.input.take_until(">");
        }

        let Some(top) = self.open.last() else {
            return;
        };
        if top.name != name {
            let message = format!(
                "Opening and ending tag mismatch: {} line {} and {name}",
                top.name, top.line
            );
            self.error(message);
        }
        self.close_current();
    }

    fn close_current(&mut self) {
        if let Some(open) = self.open.pop() {
            self.input.decrement_depth();
            if open.ns_scope {
                self.ns.pop_scope();
            }
        }
    }

    // --- Comments, CDATA, PIs ---

    fn parse_comment(&mut self, parent: NodeId) {
        self.input.advance(4);
        match self.input.take_until("-->") {
            Ok(body) => {
                if body.contains("--") {
                    self.error("Double hyphen within comment");
                }
                let node = self.doc.create_node(NodeKind::Comment {
                    content: body.to_owned(),
                });
                self.doc.append_child(parent, node);
            }
            Err(_) => self.error("Comment not terminated"),
        }
    }

    fn parse_cdata(&mut self, parent: NodeId) {
        self.input.advance("<![CDATA[".len());
        match self.input.take_until("]]>") {
            Ok(body) => {
                let node = self.doc.create_node(NodeKind::CData {
                    content: body.to_owned(),
                });
                self.doc.append_child(parent, node);
            }
            Err(_) => self.error("CData section not finished"),
        }
    }

    fn parse_pi(&mut self, parent: NodeId) {
        self.input.advance(2);
        let Some(target) = self.input.parse_name() else {
            self.error("xmlParsePI : no target name");
            let _ = self.input.take_until("?>");
            return;
        };
        if target.eq_ignore_ascii_case("xml") {
            self.error("XML declaration allowed only at the start of the document");
            let _ = self.input.take_until("?>");
            return;
        }

        let data = if self.input.looking_at("?>") {
            self.input.advance(2);
            None
        } else {
            if !self.input.skip_whitespace() {
                self.error(format!("ParsePI: PI {target} space expected"));
            }
            match self.input.take_until("?>") {
                Ok(body) => (!body.is_empty()).then(|| body.to_owned()),
                Err(_) => {
                    self.error(format!("PI {target} never end ..."));
                    return;
                }
            }
        };

        let node = self.doc.create_node(NodeKind::ProcessingInstruction {
            target: target.to_owned(),
            data,
        });
        self.doc.append_child(parent, node);
    }
}

fn predefined_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Resolves character references and predefined entities inside an entity
/// declaration's literal value. Anything else is kept verbatim.
fn expand_entity_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest.find(';') else {
            break;
        };
        let body = &rest[1..semi];
        let decoded = if let Some(hex) = body.strip_prefix("#x") {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = body.strip_prefix('#') {
            dec.parse().ok().and_then(char::from_u32)
        } else {
            predefined_entity(body).and_then(|s| s.chars().next())
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&rest[..=semi]),
        }
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    out
}
