//! Recursive descent parser producing [`Expr`] trees.
//!
//! One method per grammar level, loosest binding first:
//! `or` < `and` < equality < relational < additive < multiplicative <
//! unary minus < union < path.
//!
//! Nesting and the height of the resulting tree are both capped at
//! [`MAX_DEPTH`], so hostile input fails with an error instead of
//! exhausting the stack here or in the evaluator.

use super::ast::{Axis, BinaryOp, Expr, NodeTest, PathOrigin, Step};
use super::lexer::{tokenize, Spanned, Token};
use super::types::XPathError;

/// Deepest expression the parser accepts, counting both bracket nesting and
/// operator chains.
pub const MAX_DEPTH: usize = 100;

const RECURSION_LIMIT: &str = "Recursion limit exceeded";

/// Compiles an expression.
///
/// # Errors
///
/// Returns an `XPathError` with the byte offset of the offending token.
///
/// ```
/// use elementfinder::xpath::parser::parse;
///
/// assert!(parse("//div[@class='a']/p[1]").is_ok());
/// assert!(parse("//div[").is_err());
/// ```
pub fn parse(expr: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: expr.len(),
        depth: 0,
    };
    if parser.tokens.is_empty() {
        return Err(XPathError::at("Invalid expression", 0));
    }
    let result = parser.parse_or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("Invalid expression"));
    }
    Ok(result)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Length of the source, reported for errors at end of input.
    end: usize,
    /// Open `parse_or` calls.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> Result<(), XPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> XPathError {
        let pos = self.tokens.get(self.pos).map_or(self.end, |s| s.pos);
        XPathError::at(message, pos)
    }

    /// Joins two operands, refusing trees taller than [`MAX_DEPTH`].
    fn fold(
        &self,
        left: Expr,
        right: Expr,
        join: impl FnOnce(Expr, Expr) -> Expr,
    ) -> Result<Expr, XPathError> {
        if height(&left).max(height(&right)) >= MAX_DEPTH {
            return Err(self.error(RECURSION_LIMIT));
        }
        Ok(join(left, right))
    }

    // --- Operators ---

    fn parse_or(&mut self) -> Result<Expr, XPathError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(RECURSION_LIMIT));
        }
        self.depth += 1;
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = self.fold(left, right, |l, r| binary(BinaryOp::Or, l, r))?;
        }
        self.depth -= 1;
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = self.fold(left, right, |l, r| binary(BinaryOp::And, l, r))?;
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Neq) => BinaryOp::Neq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = self.fold(left, right, |l, r| binary(op, l, r))?;
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Lte) => BinaryOp::Lte,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Gte) => BinaryOp::Gte,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = self.fold(left, right, |l, r| binary(op, l, r))?;
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = self.fold(left, right, |l, r| binary(op, l, r))?;
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = self.fold(left, right, |l, r| binary(op, l, r))?;
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, XPathError> {
        let mut negations = 0;
        while self.eat(&Token::Minus) {
            negations += 1;
            if negations >= MAX_DEPTH {
                return Err(self.error(RECURSION_LIMIT));
            }
        }
        let mut operand = self.parse_union()?;
        if negations > 0 && height(&operand) + negations > MAX_DEPTH {
            return Err(self.error(RECURSION_LIMIT));
        }
        for _ in 0..negations {
            operand = Expr::Negate(Box::new(operand));
        }
        Ok(operand)
    }

    fn parse_union(&mut self) -> Result<Expr, XPathError> {
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path()?;
            left = self.fold(left, right, |l, r| Expr::Union(Box::new(l), Box::new(r)))?;
        }
        Ok(left)
    }

    // --- Paths ---

    fn parse_path(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                let steps = if self.at_step_start() {
                    self.parse_relative_steps()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    origin: PathOrigin::Root,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.parse_relative_steps()?);
                Ok(Expr::Path {
                    origin: PathOrigin::Root,
                    steps,
                })
            }
            _ if self.at_step_start() => {
                let steps = self.parse_relative_steps()?;
                Ok(Expr::Path {
                    origin: PathOrigin::Context,
                    steps,
                })
            }
            _ => self.parse_filter_path(),
        }
    }

    fn at_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::NameTest(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
                    | Token::At
                    | Token::Dot
                    | Token::DotDot
            )
        )
    }

    /// `step (('/' | '//') step)*`
    fn parse_relative_steps(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::AxisName(name)) = self.peek() {
            let Some(axis) = Axis::from_name(name) else {
                return Err(self.error("Invalid axis"));
            };
            self.pos += 1;
            self.expect(&Token::ColonColon, "Invalid expression")?;
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let mut step = Step::new(axis, test);
        step.predicates = self.parse_predicates()?;
        Ok(step)
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, XPathError> {
        if !matches!(self.peek(), Some(Token::NameTest(_) | Token::NodeType(_))) {
            return Err(self.error("Expected node test"));
        }
        match self.advance() {
            Some(Token::NameTest(name)) => Ok(name_test(&name)),
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LParen, "Expected '('")?;
                let test = match kind.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => {
                        let target = match self.peek() {
                            Some(Token::Literal(lit)) => Some(lit.clone()),
                            _ => None,
                        };
                        if target.is_some() {
                            self.pos += 1;
                        }
                        NodeTest::ProcessingInstruction(target)
                    }
                };
                self.expect(&Token::RParen, "Expected ')'")?;
                Ok(test)
            }
            _ => Err(self.error("Expected node test")),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            let predicate = self.parse_or()?;
            self.expect(&Token::RBracket, "Invalid predicate")?;
            predicates.push(predicate);
        }
        Ok(predicates)
    }

    /// `FilterExpr (('/' | '//') RelativeLocationPath)?`
    fn parse_filter_path(&mut self) -> Result<Expr, XPathError> {
        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let filtered = if predicates.is_empty() {
            primary
        } else {
            Expr::Filter {
                primary: Box::new(primary),
                predicates,
            }
        };

        let mut steps = Vec::new();
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                break;
            }
        }
        if steps.is_empty() {
            Ok(filtered)
        } else {
            Ok(Expr::Path {
                origin: PathOrigin::Expr(Box::new(filtered)),
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, XPathError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Literal(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(s))
            }
            Some(Token::Variable(name)) => {
                self.pos += 1;
                Ok(Expr::Variable(name))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(&Token::RParen, "Expected ')'")?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                self.pos += 1;
                self.expect(&Token::LParen, "Expected '('")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen, "Expected ')'")?;
                        break;
                    }
                }
                Ok(Expr::Function { name, args })
            }
            _ => Err(self.error("Invalid expression")),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Height of an expression tree, measured without recursion.
fn height(expr: &Expr) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(expr, 1)];
    while let Some((expr, depth)) = stack.pop() {
        deepest = deepest.max(depth);
        let below = depth + 1;
        match expr {
            Expr::Number(_) | Expr::Literal(_) | Expr::Variable(_) => {}
            Expr::Binary { left, right, .. } | Expr::Union(left, right) => {
                stack.push((&**left, below));
                stack.push((&**right, below));
            }
            Expr::Negate(inner) => stack.push((&**inner, below)),
            Expr::Function { args, .. } => stack.extend(args.iter().map(|a| (a, below))),
            Expr::Filter {
                primary,
                predicates,
            } => {
                stack.push((&**primary, below));
                stack.extend(predicates.iter().map(|p| (p, below)));
            }
            Expr::Path { origin, steps } => {
                if let PathOrigin::Expr(inner) = origin {
                    stack.push((&**inner, below));
                }
                stack.extend(
                    steps
                        .iter()
                        .flat_map(|step| &step.predicates)
                        .map(|p| (p, below)),
                );
            }
        }
    }
    deepest
}

fn descendant_or_self() -> Step {
    Step::new(Axis::DescendantOrSelf, NodeTest::Node)
}

fn name_test(name: &str) -> NodeTest {
    if name == "*" {
        return NodeTest::Any;
    }
    match name.split_once(':') {
        Some((prefix, "*")) => NodeTest::AnyInPrefix(prefix.to_owned()),
        Some((prefix, local)) => NodeTest::Name {
            prefix: Some(prefix.to_owned()),
            local: local.to_owned(),
        },
        None => NodeTest::Name {
            prefix: None,
            local: name.to_owned(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(local: &str) -> NodeTest {
        NodeTest::Name {
            prefix: None,
            local: local.to_owned(),
        }
    }

    #[test]
    fn test_double_slash_expands() {
        let expr = parse("//a").unwrap();
        assert_eq!(
            expr,
            Expr::Path {
                origin: PathOrigin::Root,
                steps: vec![
                    Step::new(Axis::DescendantOrSelf, NodeTest::Node),
                    Step::new(Axis::Child, name("a")),
                ],
            }
        );
    }

    #[test]
    fn test_bare_root() {
        assert_eq!(
            parse("/").unwrap(),
            Expr::Path {
                origin: PathOrigin::Root,
                steps: Vec::new()
            }
        );
    }

    #[test]
    fn test_abbreviated_steps() {
        let Expr::Path { steps, .. } = parse("../@id").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(steps[0], Step::new(Axis::Parent, NodeTest::Node));
        assert_eq!(steps[1], Step::new(Axis::Attribute, name("id")));
    }

    #[test]
    fn test_predicates_and_axis() {
        let Expr::Path { steps, .. } = parse("following-sibling::text()[1]").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(steps[0].axis, Axis::FollowingSibling);
        assert_eq!(steps[0].test, NodeTest::Text);
        assert_eq!(steps[0].predicates, vec![Expr::Number(1.0)]);
    }

    #[test]
    fn test_operator_precedence() {
        let expr = parse("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Or);
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Eq, .. }));
    }

    #[test]
    fn test_filter_then_path() {
        let expr = parse("(//a)[1]/b").unwrap();
        assert!(matches!(
            expr,
            Expr::Path {
                origin: PathOrigin::Expr(_),
                ..
            }
        ));
    }

    #[test]
    fn test_union_and_negation() {
        assert!(matches!(parse("a | b").unwrap(), Expr::Union(..)));
        assert!(matches!(parse("-1").unwrap(), Expr::Negate(_)));
    }

    #[test]
    fn test_errors_carry_positions() {
        let err = parse("//div[").unwrap_err();
        assert_eq!(err.position, Some(6));
        let err = parse("a b").unwrap_err();
        assert_eq!(err.message, "Invalid expression");
        assert_eq!(err.position, Some(2));
        assert!(parse("").is_err());
        assert!(parse("bogus::x").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let deep = [
            format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000)),
            format!("1{}", "+1".repeat(100_000)),
            format!("{}1", "-".repeat(100_000)),
            format!("a{}", "[a".repeat(100_000)),
            format!("{}1{}", "f(".repeat(100_000), ")".repeat(100_000)),
            format!("a{}", " | a".repeat(100_000)),
        ];
        for expr in &deep {
            let err = parse(expr).unwrap_err();
            assert_eq!(err.message, "Recursion limit exceeded");
        }
    }

    #[test]
    fn test_nesting_below_the_limit_is_accepted() {
        let parens = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&parens).unwrap(), Expr::Number(1.0));
        let chain = format!("a{}", " or a".repeat(50));
        assert!(matches!(parse(&chain).unwrap(), Expr::Binary { op: BinaryOp::Or, .. }));
        let negated = format!("{}1", "-".repeat(50));
        assert_eq!(height(&parse(&negated).unwrap()), 51);
    }

    #[test]
    fn test_prefixed_tests() {
        let Expr::Path { steps, .. } = parse("svg:*/svg:rect").unwrap() else {
            panic!("expected a path");
        };
        assert_eq!(steps[0].test, NodeTest::AnyInPrefix("svg".into()));
        assert_eq!(
            steps[1].test,
            NodeTest::Name {
                prefix: Some("svg".into()),
                local: "rect".into()
            }
        );
    }
}
