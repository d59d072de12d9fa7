//! Expression evaluation.
//!
//! [`XPathContext`] walks an [`Expr`] tree against a [`Document`]. Node-sets
//! hold [`NodeRef`]s, so attributes are selected and returned like any other
//! node. Every node-set produced here is in document order without
//! duplicates.
//!
//! Document order is computed once per context, on first use, as a preorder
//! rank for each reachable arena node. Detached nodes sort last.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::HashMap;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, PathOrigin, Step};
use super::types::{format_number, parse_number, XPathError, XPathValue};
use crate::tree::{Attribute, Document, NodeId, NodeKind, NodeRef, XMLNS_NAMESPACE};

/// Evaluation context: a document, a context node, variable bindings and
/// namespace prefixes.
///
/// # Examples
///
/// ```
/// use elementfinder::Document;
/// use elementfinder::xpath::eval::XPathContext;
/// use elementfinder::xpath::parser::parse;
/// use elementfinder::xpath::XPathValue;
///
/// let doc = Document::parse_str("<root><a/><b/></root>").unwrap();
/// let ctx = XPathContext::new(&doc, doc.root_element().unwrap());
/// let count = ctx.evaluate(&parse("count(*)").unwrap()).unwrap();
/// assert_eq!(count, XPathValue::Number(2.0));
/// ```
pub struct XPathContext<'a> {
    doc: &'a Document,
    node: NodeRef,
    variables: HashMap<String, XPathValue>,
    namespaces: HashMap<String, String>,
    order: OnceCell<Vec<u32>>,
}

/// The dynamic part of the context: which node is current and where it
/// sits in the node-set being filtered.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: NodeRef,
    position: usize,
    size: usize,
}

impl<'a> XPathContext<'a> {
    /// Creates a context positioned on `node`.
    #[must_use]
    pub fn new(doc: &'a Document, node: impl Into<NodeRef>) -> Self {
        Self {
            doc,
            node: node.into(),
            variables: HashMap::new(),
            namespaces: HashMap::new(),
            order: OnceCell::new(),
        }
    }

    /// Moves the context to another node of the same document.
    pub fn set_context_node(&mut self, node: impl Into<NodeRef>) {
        self.node = node.into();
    }

    /// Binds `$name` to a value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: XPathValue) {
        self.variables.insert(name.into(), value);
    }

    /// Builder form of [`set_variable`](Self::set_variable).
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: XPathValue) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Binds a prefix for use in name tests such as `svg:rect`.
    ///
    /// Prefixes that are never registered match nodes written with that
    /// prefix in the source markup.
    pub fn register_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.insert(prefix.into(), uri.into());
    }

    /// Evaluates a compiled expression.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown functions or variables, wrong argument
    /// counts, and path or union operands that are not node-sets.
    pub fn evaluate(&self, expr: &Expr) -> Result<XPathValue, XPathError> {
        self.eval(
            expr,
            Frame {
                node: self.node,
                position: 1,
                size: 1,
            },
        )
    }

    // --- Expressions ---

    fn eval(&self, expr: &Expr, frame: Frame) -> Result<XPathValue, XPathError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| XPathError::eval("Undefined variable")),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, frame),
            Expr::Negate(inner) => {
                let value = self.eval(inner, frame)?;
                Ok(XPathValue::Number(-self.number_of(&value)))
            }
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, frame)?;
                nodes.extend(self.node_set(right, frame)?);
                self.sort_unique(&mut nodes);
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Function { name, args } => self.call(name, args, frame),
            Expr::Filter {
                primary,
                predicates,
            } => {
                let value = self.eval(primary, frame)?;
                if predicates.is_empty() {
                    return Ok(value);
                }
                let Some(mut nodes) = value.into_node_set() else {
                    return Err(XPathError::eval("Invalid type"));
                };
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Ok(XPathValue::NodeSet(nodes))
            }
            Expr::Path { origin, steps } => {
                let start = match origin {
                    PathOrigin::Root => vec![NodeRef::Node(self.doc.root())],
                    PathOrigin::Context => vec![frame.node],
                    PathOrigin::Expr(inner) => self.node_set(inner, frame)?,
                };
                self.walk(start, steps).map(XPathValue::NodeSet)
            }
        }
    }

    fn node_set(&self, expr: &Expr, frame: Frame) -> Result<Vec<NodeRef>, XPathError> {
        self.eval(expr, frame)?
            .into_node_set()
            .ok_or_else(|| XPathError::eval("Invalid type"))
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        frame: Frame,
    ) -> Result<XPathValue, XPathError> {
        match op {
            BinaryOp::Or => Ok(XPathValue::Boolean(
                self.eval(left, frame)?.to_boolean() || self.eval(right, frame)?.to_boolean(),
            )),
            BinaryOp::And => Ok(XPathValue::Boolean(
                self.eval(left, frame)?.to_boolean() && self.eval(right, frame)?.to_boolean(),
            )),
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                let lhs = self.eval(left, frame)?;
                let rhs = self.eval(right, frame)?;
                Ok(XPathValue::Boolean(self.compare(op, &lhs, &rhs)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.number_of(&self.eval(left, frame)?);
                let r = self.number_of(&self.eval(right, frame)?);
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
        }
    }

    // --- Comparisons ---

    /// Compares two values with node-set existential semantics.
    fn compare(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        match (lhs, rhs) {
            (XPathValue::NodeSet(a), XPathValue::NodeSet(b)) => {
                let right: Vec<XPathValue> = b
                    .iter()
                    .map(|&n| XPathValue::String(self.doc.value_of(n)))
                    .collect();
                a.iter().any(|&n| {
                    let left = XPathValue::String(self.doc.value_of(n));
                    right.iter().any(|r| compare_atoms(op, &left, r))
                })
            }
            (XPathValue::NodeSet(a), XPathValue::Boolean(_)) => {
                compare_atoms(op, &XPathValue::Boolean(!a.is_empty()), rhs)
            }
            (XPathValue::Boolean(_), XPathValue::NodeSet(b)) => {
                compare_atoms(op, lhs, &XPathValue::Boolean(!b.is_empty()))
            }
            (XPathValue::NodeSet(a), other) => a
                .iter()
                .any(|&n| compare_atoms(op, &XPathValue::String(self.doc.value_of(n)), other)),
            (other, XPathValue::NodeSet(b)) => b
                .iter()
                .any(|&n| compare_atoms(op, other, &XPathValue::String(self.doc.value_of(n)))),
            _ => compare_atoms(op, lhs, rhs),
        }
    }

    fn string_of(&self, value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&n| self.doc.value_of(n))
                .unwrap_or_default(),
            XPathValue::Boolean(b) => b.to_string(),
            XPathValue::Number(n) => format_number(*n),
            XPathValue::String(s) => s.clone(),
        }
    }

    fn number_of(&self, value: &XPathValue) -> f64 {
        match value {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            XPathValue::String(s) => parse_number(s),
            XPathValue::NodeSet(_) => parse_number(&self.string_of(value)),
        }
    }

    // --- Location paths ---

    fn walk(&self, mut nodes: Vec<NodeRef>, steps: &[Step]) -> Result<Vec<NodeRef>, XPathError> {
        let mut i = 0;
        while i < steps.len() {
            let step = &steps[i];
            // `//name` with no predicates is every descendant named `name`.
            if let Some(next) = steps.get(i + 1).filter(|next| collapses_into(step, next)) {
                nodes = self.apply_step(&nodes, Axis::Descendant, &next.test, &[])?;
                i += 2;
                continue;
            }
            nodes = self.apply_step(&nodes, step.axis, &step.test, &step.predicates)?;
            i += 1;
        }
        Ok(nodes)
    }

    fn apply_step(
        &self,
        input: &[NodeRef],
        axis: Axis,
        test: &NodeTest,
        predicates: &[Expr],
    ) -> Result<Vec<NodeRef>, XPathError> {
        let mut out = Vec::new();
        for &node in input {
            let mut selected: Vec<NodeRef> = self
                .axis_nodes(node, axis)
                .into_iter()
                .filter(|&n| self.matches(n, test, axis))
                .collect();
            for predicate in predicates {
                selected = self.filter(selected, predicate)?;
            }
            out.extend(selected);
        }
        if input.len() > 1 || axis.is_reverse() {
            self.sort_unique(&mut out);
        }
        Ok(out)
    }

    /// Keeps the nodes for which `predicate` holds. `nodes` must be in
    /// proximity order so that positions count along the axis.
    fn filter(&self, nodes: Vec<NodeRef>, predicate: &Expr) -> Result<Vec<NodeRef>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let frame = Frame {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, frame)? {
                XPathValue::Number(n) => is_position(n, i + 1),
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis` from `node`, nearest first.
    fn axis_nodes(&self, node: NodeRef, axis: Axis) -> Vec<NodeRef> {
        let doc = self.doc;
        let id = match node {
            NodeRef::Attribute { owner, .. } => return self.axis_from_attribute(node, owner, axis),
            NodeRef::Node(id) => id,
        };
        match axis {
            Axis::SelfAxis => vec![node],
            Axis::Child => doc.children(id).map(NodeRef::Node).collect(),
            Axis::Descendant => doc.descendants(id).map(NodeRef::Node).collect(),
            Axis::DescendantOrSelf => std::iter::once(id)
                .chain(doc.descendants(id))
                .map(NodeRef::Node)
                .collect(),
            Axis::Parent => doc.parent(id).map(NodeRef::Node).into_iter().collect(),
            Axis::Ancestor => doc.ancestors(id).skip(1).map(NodeRef::Node).collect(),
            Axis::AncestorOrSelf => doc.ancestors(id).map(NodeRef::Node).collect(),
            Axis::FollowingSibling => std::iter::successors(doc.next_sibling(id), |&s| {
                doc.next_sibling(s)
            })
            .map(NodeRef::Node)
            .collect(),
            Axis::PrecedingSibling => std::iter::successors(doc.prev_sibling(id), |&s| {
                doc.prev_sibling(s)
            })
            .map(NodeRef::Node)
            .collect(),
            Axis::Following => self.following(id),
            Axis::Preceding => self.preceding(id),
            Axis::Attribute => doc
                .attributes(id)
                .iter()
                .enumerate()
                .filter(|(_, attr)| !is_namespace_declaration(attr))
                .map(|(index, _)| NodeRef::Attribute { owner: id, index })
                .collect(),
            // Namespace nodes are not modelled.
            Axis::Namespace => Vec::new(),
        }
    }

    fn axis_from_attribute(&self, node: NodeRef, owner: NodeId, axis: Axis) -> Vec<NodeRef> {
        let doc = self.doc;
        match axis {
            Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
            Axis::Parent => vec![NodeRef::Node(owner)],
            Axis::Ancestor => doc.ancestors(owner).map(NodeRef::Node).collect(),
            Axis::AncestorOrSelf => std::iter::once(node)
                .chain(doc.ancestors(owner).map(NodeRef::Node))
                .collect(),
            Axis::Following => doc
                .descendants(owner)
                .map(NodeRef::Node)
                .chain(self.following(owner))
                .collect(),
            Axis::Preceding => self.preceding(owner),
            _ => Vec::new(),
        }
    }

    fn following(&self, id: NodeId) -> Vec<NodeRef> {
        let doc = self.doc;
        let mut out = Vec::new();
        for ancestor in doc.ancestors(id) {
            let mut sibling = doc.next_sibling(ancestor);
            while let Some(s) = sibling {
                out.push(NodeRef::Node(s));
                out.extend(doc.descendants(s).map(NodeRef::Node));
                sibling = doc.next_sibling(s);
            }
        }
        out
    }

    fn preceding(&self, id: NodeId) -> Vec<NodeRef> {
        let doc = self.doc;
        let mut out = Vec::new();
        for ancestor in doc.ancestors(id) {
            let mut sibling = doc.prev_sibling(ancestor);
            while let Some(s) = sibling {
                let subtree: Vec<NodeId> = std::iter::once(s).chain(doc.descendants(s)).collect();
                out.extend(subtree.into_iter().rev().map(NodeRef::Node));
                sibling = doc.prev_sibling(s);
            }
        }
        out
    }

    // --- Node tests ---

    fn matches(&self, node: NodeRef, test: &NodeTest, axis: Axis) -> bool {
        match node {
            NodeRef::Attribute { owner, index } => {
                let Some(attr) = self.doc.attribute_at(owner, index) else {
                    return false;
                };
                // Name tests select the principal node type, which is only
                // the attribute on the attribute axis.
                let principal = axis == Axis::Attribute;
                match test {
                    NodeTest::Node => true,
                    NodeTest::Any => principal,
                    NodeTest::AnyInPrefix(prefix) => {
                        principal
                            && self.prefix_matches(
                                prefix,
                                attr.prefix.as_deref(),
                                attr.namespace.as_deref(),
                            )
                    }
                    NodeTest::Name { prefix, local } => {
                        principal
                            && self.name_matches(
                                prefix.as_deref(),
                                local,
                                &attr.name,
                                attr.prefix.as_deref(),
                                attr.namespace.as_deref(),
                            )
                    }
                    _ => false,
                }
            }
            NodeRef::Node(id) => {
                let kind = &self.doc.node(id).kind;
                match test {
                    NodeTest::Node => !matches!(kind, NodeKind::DocumentType { .. }),
                    NodeTest::Text => {
                        matches!(kind, NodeKind::Text { .. } | NodeKind::CData { .. })
                    }
                    NodeTest::Comment => matches!(kind, NodeKind::Comment { .. }),
                    NodeTest::ProcessingInstruction(wanted) => match kind {
                        NodeKind::ProcessingInstruction { target, .. } => match wanted {
                            Some(w) => w == target,
                            None => true,
                        },
                        _ => false,
                    },
                    NodeTest::Any | NodeTest::AnyInPrefix(_) | NodeTest::Name { .. } => {
                        let NodeKind::Element {
                            name,
                            prefix,
                            namespace,
                            ..
                        } = kind
                        else {
                            return false;
                        };
                        match test {
                            NodeTest::AnyInPrefix(p) => {
                                self.prefix_matches(p, prefix.as_deref(), namespace.as_deref())
                            }
                            NodeTest::Name {
                                prefix: p,
                                local,
                            } => self.name_matches(
                                p.as_deref(),
                                local,
                                name,
                                prefix.as_deref(),
                                namespace.as_deref(),
                            ),
                            _ => true,
                        }
                    }
                }
            }
        }
    }

    fn prefix_matches(&self, wanted: &str, prefix: Option<&str>, namespace: Option<&str>) -> bool {
        match self.namespaces.get(wanted) {
            Some(uri) => namespace == Some(uri.as_str()),
            None => prefix == Some(wanted),
        }
    }

    fn name_matches(
        &self,
        wanted_prefix: Option<&str>,
        wanted_local: &str,
        name: &str,
        prefix: Option<&str>,
        namespace: Option<&str>,
    ) -> bool {
        let Some(wanted_prefix) = wanted_prefix else {
            return namespace.is_none() && name == wanted_local;
        };
        if let Some(uri) = self.namespaces.get(wanted_prefix) {
            return namespace == Some(uri.as_str()) && name == wanted_local;
        }
        if prefix.is_some() {
            return prefix == Some(wanted_prefix) && name == wanted_local;
        }
        // HTML keeps `svg:rect` as one name.
        name.strip_prefix(wanted_prefix)
            .and_then(|rest| rest.strip_prefix(':'))
            == Some(wanted_local)
    }

    // --- Document order ---

    fn order_key(&self, node: NodeRef) -> (u32, usize, usize) {
        let ranks = self.order.get_or_init(|| document_ranks(self.doc));
        let anchor = node.node_id();
        let rank = ranks.get(anchor.as_index()).copied().unwrap_or(u32::MAX);
        let slot = match node {
            NodeRef::Node(_) => 0,
            NodeRef::Attribute { index, .. } => index + 1,
        };
        (rank, anchor.as_index(), slot)
    }

    fn sort_unique(&self, nodes: &mut Vec<NodeRef>) {
        nodes.sort_by_key(|&n| self.order_key(n));
        nodes.dedup();
    }

    // --- Functions ---

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn call(&self, name: &str, args: &[Expr], frame: Frame) -> Result<XPathValue, XPathError> {
        let arity = |min: usize, max: usize| {
            if (min..=max).contains(&args.len()) {
                Ok(())
            } else {
                Err(XPathError::eval("Invalid number of arguments"))
            }
        };
        let value = match name {
            "last" => {
                arity(0, 0)?;
                XPathValue::Number(frame.size as f64)
            }
            "position" => {
                arity(0, 0)?;
                XPathValue::Number(frame.position as f64)
            }
            "count" => {
                arity(1, 1)?;
                XPathValue::Number(self.node_set(&args[0], frame)?.len() as f64)
            }
            "id" => {
                arity(1, 1)?;
                let arg = self.eval(&args[0], frame)?;
                XPathValue::NodeSet(self.id(&arg))
            }
            "local-name" | "name" | "namespace-uri" => {
                arity(0, 1)?;
                let node = match args.first() {
                    Some(arg) => self.node_set(arg, frame)?.first().copied(),
                    None => Some(frame.node),
                };
                let part = match name {
                    "local-name" => NamePart::Local,
                    "name" => NamePart::Qualified,
                    _ => NamePart::Namespace,
                };
                XPathValue::String(node.map(|n| self.name_part(n, part)).unwrap_or_default())
            }
            "string" => {
                arity(0, 1)?;
                XPathValue::String(self.string_arg(args.first(), frame)?)
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(XPathError::eval("Invalid number of arguments"));
                }
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.string_of(&self.eval(arg, frame)?));
                }
                XPathValue::String(out)
            }
            "starts-with" | "contains" | "substring-before" | "substring-after" => {
                arity(2, 2)?;
                let haystack = self.string_of(&self.eval(&args[0], frame)?);
                let needle = self.string_of(&self.eval(&args[1], frame)?);
                match name {
                    "starts-with" => XPathValue::Boolean(haystack.starts_with(&needle)),
                    "contains" => XPathValue::Boolean(haystack.contains(&needle)),
                    "substring-before" => XPathValue::String(
                        haystack
                            .find(&needle)
                            .map(|i| haystack[..i].to_owned())
                            .unwrap_or_default(),
                    ),
                    _ => XPathValue::String(
                        haystack
                            .find(&needle)
                            .map(|i| haystack[i + needle.len()..].to_owned())
                            .unwrap_or_default(),
                    ),
                }
            }
            "substring" => {
                arity(2, 3)?;
                let s = self.string_of(&self.eval(&args[0], frame)?);
                let start = self.number_of(&self.eval(&args[1], frame)?);
                let length = match args.get(2) {
                    Some(arg) => Some(self.number_of(&self.eval(arg, frame)?)),
                    None => None,
                };
                XPathValue::String(substring(&s, start, length))
            }
            "string-length" => {
                arity(0, 1)?;
                let s = self.string_arg(args.first(), frame)?;
                XPathValue::Number(s.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1)?;
                let s = self.string_arg(args.first(), frame)?;
                XPathValue::String(normalize_space(&s))
            }
            "translate" => {
                arity(3, 3)?;
                let s = self.string_of(&self.eval(&args[0], frame)?);
                let from = self.string_of(&self.eval(&args[1], frame)?);
                let to = self.string_of(&self.eval(&args[2], frame)?);
                XPathValue::String(translate(&s, &from, &to))
            }
            "boolean" => {
                arity(1, 1)?;
                XPathValue::Boolean(self.eval(&args[0], frame)?.to_boolean())
            }
            "not" => {
                arity(1, 1)?;
                XPathValue::Boolean(!self.eval(&args[0], frame)?.to_boolean())
            }
            "true" => {
                arity(0, 0)?;
                XPathValue::Boolean(true)
            }
            "false" => {
                arity(0, 0)?;
                XPathValue::Boolean(false)
            }
            "lang" => {
                arity(1, 1)?;
                let wanted = self.string_of(&self.eval(&args[0], frame)?);
                XPathValue::Boolean(self.lang_matches(frame.node, &wanted))
            }
            "number" => {
                arity(0, 1)?;
                XPathValue::Number(match args.first() {
                    Some(arg) => self.number_of(&self.eval(arg, frame)?),
                    None => parse_number(&self.doc.value_of(frame.node)),
                })
            }
            "sum" => {
                arity(1, 1)?;
                let nodes = self.node_set(&args[0], frame)?;
                XPathValue::Number(
                    nodes
                        .iter()
                        .map(|&n| parse_number(&self.doc.value_of(n)))
                        .sum(),
                )
            }
            "floor" | "ceiling" | "round" => {
                arity(1, 1)?;
                let n = self.number_of(&self.eval(&args[0], frame)?);
                XPathValue::Number(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => round(n),
                })
            }
            _ => return Err(XPathError::eval("Unregistered function")),
        };
        Ok(value)
    }

    /// The string form of an optional argument, defaulting to the context
    /// node's string-value.
    fn string_arg(&self, arg: Option<&Expr>, frame: Frame) -> Result<String, XPathError> {
        match arg {
            Some(expr) => Ok(self.string_of(&self.eval(expr, frame)?)),
            None => Ok(self.doc.value_of(frame.node)),
        }
    }

    fn name_part(&self, node: NodeRef, part: NamePart) -> String {
        match node {
            NodeRef::Attribute { owner, index } => {
                let Some(attr) = self.doc.attribute_at(owner, index) else {
                    return String::new();
                };
                match part {
                    NamePart::Local => attr.name.clone(),
                    NamePart::Qualified => attr.qualified_name().into_owned(),
                    NamePart::Namespace => attr.namespace.clone().unwrap_or_default(),
                }
            }
            NodeRef::Node(id) => match part {
                NamePart::Local => self.doc.node_name(id).unwrap_or_default().to_owned(),
                NamePart::Qualified => self
                    .doc
                    .qualified_name(id)
                    .map(Cow::into_owned)
                    .or_else(|| self.doc.node_name(id).map(str::to_owned))
                    .unwrap_or_default(),
                NamePart::Namespace => self.doc.node_namespace(id).unwrap_or_default().to_owned(),
            },
        }
    }

    fn id(&self, arg: &XPathValue) -> Vec<NodeRef> {
        let source = match arg {
            XPathValue::NodeSet(nodes) => nodes
                .iter()
                .map(|&n| self.doc.value_of(n))
                .collect::<Vec<_>>()
                .join(" "),
            other => self.string_of(other),
        };
        let wanted: Vec<&str> = source.split(is_xml_space).filter(|t| !t.is_empty()).collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        let root = self.doc.root();
        std::iter::once(root)
            .chain(self.doc.descendants(root))
            .filter(|&id| {
                self.doc
                    .attributes(id)
                    .iter()
                    .any(|a| a.name == "id" && wanted.contains(&a.value.as_str()))
            })
            .map(NodeRef::Node)
            .collect()
    }

    fn lang_matches(&self, node: NodeRef, wanted: &str) -> bool {
        let declared = self.doc.ancestors(node.node_id()).find_map(|id| {
            self.doc
                .attributes(id)
                .iter()
                .find(|a| a.name == "lang" && a.prefix.as_deref() == Some("xml"))
                .map(|a| a.value.to_ascii_lowercase())
        });
        let Some(declared) = declared else {
            return false;
        };
        let wanted = wanted.to_ascii_lowercase();
        declared == wanted
            || declared
                .strip_prefix(&wanted)
                .is_some_and(|rest| rest.starts_with('-'))
    }
}

#[derive(Debug, Clone, Copy)]
enum NamePart {
    Local,
    Qualified,
    Namespace,
}

fn collapses_into(step: &Step, next: &Step) -> bool {
    step.axis == Axis::DescendantOrSelf
        && step.test == NodeTest::Node
        && step.predicates.is_empty()
        && next.axis == Axis::Child
        && next.predicates.is_empty()
}

fn is_namespace_declaration(attr: &Attribute) -> bool {
    attr.namespace.as_deref() == Some(XMLNS_NAMESPACE)
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Preorder ranks indexed by arena slot. Unreachable slots keep `u32::MAX`.
fn document_ranks(doc: &Document) -> Vec<u32> {
    let mut ranks = vec![u32::MAX; doc.node_count() + 1];
    let root = doc.root();
    for (rank, id) in std::iter::once(root).chain(doc.descendants(root)).enumerate() {
        if let Some(slot) = ranks.get_mut(id.as_index()) {
            *slot = u32::try_from(rank).unwrap_or(u32::MAX);
        }
    }
    ranks
}

/// Compares two non-node-set values (XPath 3.4).
#[allow(clippy::float_cmp)]
fn compare_atoms(op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
    let number = |v: &XPathValue| match v {
        XPathValue::Number(n) => *n,
        XPathValue::Boolean(b) => f64::from(u8::from(*b)),
        XPathValue::String(s) => parse_number(s),
        XPathValue::NodeSet(_) => f64::NAN,
    };
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (lhs, rhs) {
                (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                    lhs.to_boolean() == rhs.to_boolean()
                }
                (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                    number(lhs) == number(rhs)
                }
                (XPathValue::String(a), XPathValue::String(b)) => a == b,
                _ => false,
            };
            if op == BinaryOp::Eq {
                equal
            } else {
                !equal
            }
        }
        BinaryOp::Lt => number(lhs) < number(rhs),
        BinaryOp::Lte => number(lhs) <= number(rhs),
        BinaryOp::Gt => number(lhs) > number(rhs),
        BinaryOp::Gte => number(lhs) >= number(rhs),
        _ => false,
    }
}

#[allow(clippy::float_cmp, clippy::cast_precision_loss)]
fn is_position(n: f64, position: usize) -> bool {
    n == position as f64
}

/// XPath `round()`: halves go towards positive infinity and negative
/// inputs that round to zero give `-0`.
#[allow(clippy::float_cmp)]
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n.fract() == 0.0 {
        return n;
    }
    if (-0.5..0.0).contains(&n) {
        return -0.0;
    }
    (n + 0.5).floor()
}

#[allow(clippy::cast_precision_loss)]
fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = round(start);
    let end = length.map(|len| first + round(len));
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            let position = (i + 1) as f64;
            position >= first && !matches!(end, Some(e) if position >= e)
        })
        .map(|(_, c)| c)
        .collect()
}

fn normalize_space(s: &str) -> String {
    s.split(is_xml_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.chars().position(|f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::html::parse_html;
    use crate::xpath::parser::parse;
    use pretty_assertions::assert_eq;

    fn xml(input: &str) -> Document {
        Document::parse_str(input).unwrap()
    }

    fn eval(doc: &Document, expr: &str) -> XPathValue {
        XPathContext::new(doc, doc.root())
            .evaluate(&parse(expr).unwrap())
            .unwrap()
    }

    fn eval_err(doc: &Document, expr: &str) -> XPathError {
        XPathContext::new(doc, doc.root())
            .evaluate(&parse(expr).unwrap())
            .unwrap_err()
    }

    fn values(doc: &Document, expr: &str) -> Vec<String> {
        eval(doc, expr)
            .into_node_set()
            .unwrap()
            .into_iter()
            .map(|n| doc.value_of(n))
            .collect()
    }

    fn number(doc: &Document, expr: &str) -> f64 {
        match eval(doc, expr) {
            XPathValue::Number(n) => n,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    fn string(doc: &Document, expr: &str) -> String {
        match eval(doc, expr) {
            XPathValue::String(s) => s,
            other => panic!("expected a string, got {other:?}"),
        }
    }

    fn boolean(doc: &Document, expr: &str) -> bool {
        eval(doc, expr).to_boolean()
    }

    // --- Paths and axes ---

    #[test]
    fn test_following_sibling_text_with_position() {
        let doc = xml("<r><p><b>a</b>t1<i>x</i>t2</p><p><b>c</b>other</p></r>");
        assert_eq!(
            values(&doc, "//b/following-sibling::text()[1]"),
            ["t1", "other"]
        );
        assert_eq!(
            values(&doc, "//b/following-sibling::text()"),
            ["t1", "t2", "other"]
        );
    }

    #[test]
    fn test_reverse_axis_positions_count_from_context() {
        let doc = xml("<r><a>1</a><a>2</a><a>3</a><c/></r>");
        assert_eq!(values(&doc, "//c/preceding-sibling::a[1]"), ["3"]);
        assert_eq!(values(&doc, "//c/preceding-sibling::a[last()]"), ["1"]);
        // Results are still returned in document order.
        assert_eq!(values(&doc, "//c/preceding-sibling::a"), ["1", "2", "3"]);
    }

    #[test]
    fn test_descendant_shortcut_keeps_per_parent_positions() {
        let doc = xml("<r><s><p>1</p><p>2</p></s><s><p>3</p></s></r>");
        assert_eq!(values(&doc, "//p[1]"), ["1", "3"]);
        assert_eq!(values(&doc, "(//p)[1]"), ["1"]);
        assert_eq!(values(&doc, "//p"), ["1", "2", "3"]);
    }

    #[test]
    fn test_ancestor_and_parent() {
        let doc = xml("<a><b><c/></b></a>");
        assert_eq!(number(&doc, "count(//c/ancestor::*)"), 2.0);
        assert_eq!(number(&doc, "count(//c/ancestor-or-self::node())"), 4.0);
        assert_eq!(string(&doc, "name(//c/..)"), "b");
        assert_eq!(string(&doc, "name(//c/ancestor::*[1])"), "b");
    }

    #[test]
    fn test_following_and_preceding() {
        let doc = xml("<r><a><a1/></a><b/><c><c1/></c></r>");
        let names = |expr: &str| -> Vec<String> {
            eval(&doc, expr)
                .into_node_set()
                .unwrap()
                .into_iter()
                .map(|n| doc.node_name(n.node_id()).unwrap().to_owned())
                .collect()
        };
        assert_eq!(names("//b/following::*"), ["c", "c1"]);
        assert_eq!(names("//b/preceding::*"), ["a", "a1"]);
        assert_eq!(names("//c1/preceding::*[1]"), ["b"]);
    }

    #[test]
    fn test_attribute_axis_skips_namespace_declarations() {
        let doc = xml(r#"<r xmlns:p="urn:p" a="1" p:b="2"/>"#);
        assert_eq!(number(&doc, "count(/r/@*)"), 2.0);
        assert_eq!(values(&doc, "/r/@a"), ["1"]);
    }

    #[test]
    fn test_attribute_context_axes() {
        let doc = xml(r#"<r><a x="1"><k/></a><b/></r>"#);
        assert_eq!(string(&doc, "name(//@x/..)"), "a");
        assert_eq!(number(&doc, "count(//@x/following::*)"), 2.0);
        assert_eq!(number(&doc, "count(//@x/ancestor::*)"), 2.0);
        assert_eq!(number(&doc, "count(//@x/child::node())"), 0.0);
        assert_eq!(string(&doc, "name(//@x)"), "x");
        assert_eq!(string(&doc, "local-name(//@x/self::node())"), "x");
    }

    #[test]
    fn test_union_is_in_document_order() {
        let doc = xml("<r><a>1</a><b>2</b><a>3</a></r>");
        assert_eq!(values(&doc, "//b | //a"), ["1", "2", "3"]);
        assert_eq!(values(&doc, "//a | //a"), ["1", "3"]);
    }

    #[test]
    fn test_root_and_relative_paths() {
        let doc = xml("<r><a>x</a></r>");
        let root_set = eval(&doc, "/").into_node_set().unwrap();
        assert_eq!(root_set, vec![NodeRef::Node(doc.root())]);

        let r = doc.root_element().unwrap();
        let ctx = XPathContext::new(&doc, r);
        let found = ctx.evaluate(&parse("a").unwrap()).unwrap();
        assert_eq!(found.into_node_set().unwrap().len(), 1);
        let found = ctx.evaluate(&parse("./a/text()").unwrap()).unwrap();
        assert_eq!(found.into_node_set().unwrap().len(), 1);
    }

    #[test]
    fn test_html_documents() {
        let doc = parse_html("<div class='x'><a href='/1'>one</a></div><div><a>two</a></div>");
        assert_eq!(values(&doc, "//div[@class='x']/a"), ["one"]);
        assert_eq!(values(&doc, "//a/@href"), ["/1"]);
        assert_eq!(number(&doc, "count(//div)"), 2.0);
    }

    // --- Variables and namespaces ---

    #[test]
    fn test_node_set_variable_intersection() {
        let doc = xml("<r><h2>A</h2><p>1</p><p>2</p><h2>B</h2><p>3</p></r>");
        let second = eval(&doc, "//h2[2]/preceding-sibling::p");
        let ctx = XPathContext::new(&doc, doc.root()).with_variable("ns2", second);
        let result = ctx
            .evaluate(&parse("//h2[1]/following-sibling::p[count(.|$ns2)=count($ns2)]").unwrap())
            .unwrap();
        let found: Vec<String> = result
            .into_node_set()
            .unwrap()
            .into_iter()
            .map(|n| doc.value_of(n))
            .collect();
        assert_eq!(found, ["1", "2"]);
    }

    #[test]
    fn test_registered_namespace_prefix() {
        let doc = xml(r#"<r xmlns="urn:d" xmlns:s="urn:s"><s:x>1</s:x><y>2</y></r>"#);
        // Unprefixed names only match elements in no namespace.
        assert_eq!(number(&doc, "count(//y)"), 0.0);
        // Unregistered prefixes match the prefix as written.
        assert_eq!(values(&doc, "//s:x"), ["1"]);

        let mut ctx = XPathContext::new(&doc, doc.root());
        ctx.register_namespace("d", "urn:d");
        let found = ctx.evaluate(&parse("//d:y").unwrap()).unwrap();
        assert_eq!(found.into_node_set().unwrap().len(), 1);
        let found = ctx.evaluate(&parse("count(//d:*)").unwrap()).unwrap();
        assert_eq!(found, XPathValue::Number(2.0));
    }

    // --- Operators ---

    #[test]
    fn test_arithmetic() {
        let doc = xml("<r/>");
        assert_eq!(number(&doc, "1 + 2 * 3"), 7.0);
        assert_eq!(number(&doc, "7 mod 3"), 1.0);
        assert_eq!(number(&doc, "-7 mod 3"), -1.0);
        assert_eq!(number(&doc, "1 div 4"), 0.25);
        assert!(number(&doc, "0 div 0").is_nan());
        assert_eq!(number(&doc, "- - 2"), 2.0);
    }

    #[test]
    fn test_node_set_comparisons() {
        let doc = xml("<r><v>1</v><v>5</v><w>5</w></r>");
        assert!(boolean(&doc, "//v = 5"));
        assert!(boolean(&doc, "//v != 5"));
        assert!(boolean(&doc, "//v = //w"));
        assert!(boolean(&doc, "//v < 2"));
        assert!(!boolean(&doc, "//v > 5"));
        assert!(boolean(&doc, "//v = '1'"));
        assert!(!boolean(&doc, "//missing = ''"));
        assert!(boolean(&doc, "//missing = false()"));
    }

    #[test]
    fn test_scalar_comparisons() {
        let doc = xml("<r/>");
        assert!(boolean(&doc, "'1.0' = 1"));
        assert!(!boolean(&doc, "'a' = 'b'"));
        assert!(boolean(&doc, "'abc' = true()"));
        assert!(boolean(&doc, "0 div 0 != 0 div 0"));
        assert!(boolean(&doc, "'2' > 1"));
    }

    #[test]
    fn test_boolean_short_circuit() {
        let doc = xml("<r/>");
        assert!(boolean(&doc, "true() or $undefined"));
        assert!(!boolean(&doc, "false() and $undefined"));
    }

    // --- Functions ---

    #[test]
    fn test_string_functions() {
        let doc = xml("<r><a> x  y </a></r>");
        assert_eq!(string(&doc, "concat('a', 1, true())"), "a1true");
        assert_eq!(string(&doc, "normalize-space(//a)"), "x y");
        assert_eq!(string(&doc, "substring-before('2024-01', '-')"), "2024");
        assert_eq!(string(&doc, "substring-after('2024-01', '-')"), "01");
        assert_eq!(string(&doc, "substring-after('abc', '')"), "abc");
        assert_eq!(string(&doc, "translate('bar', 'abc', 'ABC')"), "BAr");
        assert_eq!(string(&doc, "translate('--aaa--', 'abc-', 'ABC')"), "AAA");
        assert_eq!(number(&doc, "string-length('héllo')"), 5.0);
        assert!(boolean(&doc, "starts-with('prefix', 'pre')"));
        assert!(boolean(&doc, "contains('haystack', 'st')"));
    }

    #[test]
    fn test_substring_rounding() {
        let doc = xml("<r/>");
        assert_eq!(string(&doc, "substring('12345', 2, 3)"), "234");
        assert_eq!(string(&doc, "substring('12345', 2)"), "2345");
        assert_eq!(string(&doc, "substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(string(&doc, "substring('12345', 0, 3)"), "12");
        assert_eq!(string(&doc, "substring('12345', 0 div 0, 3)"), "");
        assert_eq!(string(&doc, "substring('12345', -42, 1 div 0)"), "12345");
        assert_eq!(string(&doc, "substring('12345', -1 div 0, 1 div 0)"), "");
    }

    #[test]
    fn test_number_functions() {
        let doc = xml("<r><n>1</n><n>2.5</n></r>");
        assert_eq!(number(&doc, "sum(//n)"), 3.5);
        assert_eq!(number(&doc, "floor(2.7)"), 2.0);
        assert_eq!(number(&doc, "ceiling(2.1)"), 3.0);
        assert_eq!(number(&doc, "round(2.5)"), 3.0);
        assert_eq!(number(&doc, "round(-2.5)"), -2.0);
        assert!(number(&doc, "round(-0.2)").is_sign_negative());
        assert!(number(&doc, "number('abc')").is_nan());
        assert_eq!(number(&doc, "number(true())"), 1.0);
    }

    #[test]
    fn test_context_functions() {
        let doc = xml("<r><i>a</i><i>b</i><i>c</i></r>");
        assert_eq!(values(&doc, "//i[position() = last()]"), ["c"]);
        assert_eq!(values(&doc, "//i[position() > 1]"), ["b", "c"]);
        assert_eq!(values(&doc, "//i[string-length() = 1][2]"), ["b"]);
        assert_eq!(values(&doc, "//i[not(. = 'b')]"), ["a", "c"]);
    }

    #[test]
    fn test_id_and_lang() {
        let doc = xml(r#"<r xml:lang="en-GB"><a id="x">1</a><b id="y">2</b><c/></r>"#);
        assert_eq!(values(&doc, "id('y x')"), ["1", "2"]);
        assert!(boolean(&doc, "//c[lang('en')]"));
        assert!(!boolean(&doc, "//c[lang('fr')]"));
    }

    #[test]
    fn test_name_functions() {
        let doc = xml(r#"<r xmlns:p="urn:p"><p:x p:k="v"/></r>"#);
        assert_eq!(string(&doc, "name(//p:x)"), "p:x");
        assert_eq!(string(&doc, "local-name(//p:x)"), "x");
        assert_eq!(string(&doc, "namespace-uri(//p:x)"), "urn:p");
        assert_eq!(string(&doc, "name(//p:x/@*)"), "p:k");
        assert_eq!(string(&doc, "name(//missing)"), "");
    }

    // --- Errors ---

    #[test]
    fn test_evaluation_errors() {
        let doc = xml("<r/>");
        assert_eq!(eval_err(&doc, "foo()").message, "Unregistered function");
        assert_eq!(eval_err(&doc, "count()").message, "Invalid number of arguments");
        assert_eq!(eval_err(&doc, "concat('a')").message, "Invalid number of arguments");
        assert_eq!(eval_err(&doc, "$nope").message, "Undefined variable");
        assert_eq!(eval_err(&doc, "1 | //r").message, "Invalid type");
        assert_eq!(eval_err(&doc, "count('a')").message, "Invalid type");
        assert_eq!(eval_err(&doc, "'a'[1]").message, "Invalid type");
    }
}
