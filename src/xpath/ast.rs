//! Compiled form of an `XPath` expression.
//!
//! Abbreviations are expanded by the parser: `//` becomes a
//! `descendant-or-self::node()` step, `.` and `..` become `self::node()` and
//! `parent::node()`, and `@x` becomes `attribute::x`.

use std::fmt;

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(f64),
    /// A string literal.
    Literal(String),
    /// `$name`.
    Variable(String),
    /// A binary operator application.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary minus.
    Negate(Box<Expr>),
    /// `a | b`.
    Union(Box<Expr>, Box<Expr>),
    /// A core function call.
    Function {
        /// Function name as written.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
    /// A primary expression filtered by predicates, e.g. `$set[2]`.
    Filter {
        /// The filtered expression.
        primary: Box<Expr>,
        /// Predicates applied in order.
        predicates: Vec<Expr>,
    },
    /// A location path.
    Path {
        /// Where the path starts.
        origin: PathOrigin,
        /// Steps applied left to right.
        steps: Vec<Step>,
    },
}

/// The starting point of a location path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOrigin {
    /// The document node (`/...`).
    Root,
    /// The context node (relative paths).
    Context,
    /// The node-set produced by a filter expression (`$x/a`, `(//a)[1]/b`).
    Expr(Box<Expr>),
}

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `or`
    Or,
    /// `and`
    And,
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `div`
    Div,
    /// `mod`
    Mod,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        })
    }
}

/// One step of a location path: `axis::test[pred]...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Direction of travel from each context node.
    pub axis: Axis,
    /// Which nodes on the axis are kept.
    pub test: NodeTest,
    /// Predicates, applied in order with proximity positions.
    pub predicates: Vec<Expr>,
}

impl Step {
    pub(crate) fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: Vec::new(),
        }
    }
}

/// The thirteen `XPath` axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// `ancestor`
    Ancestor,
    /// `ancestor-or-self`
    AncestorOrSelf,
    /// `attribute`
    Attribute,
    /// `child`
    Child,
    /// `descendant`
    Descendant,
    /// `descendant-or-self`
    DescendantOrSelf,
    /// `following`
    Following,
    /// `following-sibling`
    FollowingSibling,
    /// `namespace`
    Namespace,
    /// `parent`
    Parent,
    /// `preceding`
    Preceding,
    /// `preceding-sibling`
    PrecedingSibling,
    /// `self`
    SelfAxis,
}

impl Axis {
    /// Looks up an axis by its name in expressions.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "namespace" => Self::Namespace,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }

    /// Reverse axes number their nodes from the context outwards, so
    /// `preceding-sibling::x[1]` is the nearest preceding sibling.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

/// A node test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A name, optionally prefixed (`div`, `svg:rect`).
    Name {
        /// Prefix before the colon.
        prefix: Option<String>,
        /// Local part.
        local: String,
    },
    /// `*`
    Any,
    /// `prefix:*`
    AnyInPrefix(String),
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_names() {
        assert_eq!(Axis::from_name("following-sibling"), Some(Axis::FollowingSibling));
        assert_eq!(Axis::from_name("self"), Some(Axis::SelfAxis));
        assert_eq!(Axis::from_name("children"), None);
    }

    #[test]
    fn test_reverse_axes() {
        assert!(Axis::PrecedingSibling.is_reverse());
        assert!(Axis::AncestorOrSelf.is_reverse());
        assert!(!Axis::Following.is_reverse());
        assert!(!Axis::Parent.is_reverse());
    }

    #[test]
    fn test_binary_op_display() {
        assert_eq!(BinaryOp::Neq.to_string(), "!=");
        assert_eq!(BinaryOp::Mod.to_string(), "mod");
    }
}
