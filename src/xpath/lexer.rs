//! `XPath` tokenizer.
//!
//! Tokenizing happens in two passes. The first splits the expression into
//! raw tokens. The second applies the disambiguation rules of XPath
//! section 3.7, which depend on the neighbouring tokens:
//!
//! - After a token that ends an operand, `*` is multiplication and the names
//!   `and`, `or`, `div`, `mod` are operators.
//! - A name followed by `(` is a function name, or a node type test for
//!   `node`, `text`, `comment` and `processing-instruction`.
//! - A name followed by `::` is an axis name.

use super::types::XPathError;

/// A classified token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `.`
    Dot,
    /// `..`
    DotDot,
    /// `@`
    At,
    /// `,`
    Comma,
    /// `::`
    ColonColon,
    /// `/`
    Slash,
    /// `//`
    DoubleSlash,
    /// `|`
    Pipe,
    /// `+`
    Plus,
    /// `-`
    Minus,
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
    /// `*` as multiplication.
    Multiply,
    /// `and`
    And,
    /// `or`
    Or,
    /// `div`
    Div,
    /// `mod`
    Mod,
    /// A number literal.
    Number(f64),
    /// A string literal without its quotes.
    Literal(String),
    /// `$name`, without the dollar sign.
    Variable(String),
    /// A name test: a `QName`, `*` or `prefix:*`.
    NameTest(String),
    /// A name that precedes `(`.
    FunctionName(String),
    /// `node`, `text`, `comment` or `processing-instruction` before `(`.
    NodeType(String),
    /// A name that precedes `::`.
    AxisName(String),
}

impl Token {
    /// Tokens after which `*` and operator names keep their operator
    /// meaning.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Self::RParen
                | Self::RBracket
                | Self::Dot
                | Self::DotDot
                | Self::Number(_)
                | Self::Literal(_)
                | Self::Variable(_)
                | Self::NameTest(_)
        )
    }
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token.
    pub token: Token,
    /// Byte offset in the expression.
    pub pos: usize,
}

/// Splits an expression into classified tokens.
///
/// # Errors
///
/// Returns an error for unterminated literals and characters that cannot
/// start a token.
pub fn tokenize(expr: &str) -> Result<Vec<Spanned>, XPathError> {
    let raw = scan(expr)?;
    Ok(classify(raw))
}

// ---------------------------------------------------------------------------
// Pass 1: raw scan
// ---------------------------------------------------------------------------

fn scan(expr: &str) -> Result<Vec<Spanned>, XPathError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
            i += 1;
            continue;
        }
        let start = i;
        let (token, len) = match b {
            b'(' => (Token::LParen, 1),
            b')' => (Token::RParen, 1),
            b'[' => (Token::LBracket, 1),
            b']' => (Token::RBracket, 1),
            b'@' => (Token::At, 1),
            b',' => (Token::Comma, 1),
            b'|' => (Token::Pipe, 1),
            b'+' => (Token::Plus, 1),
            b'-' => (Token::Minus, 1),
            b'=' => (Token::Eq, 1),
            b'*' => (Token::NameTest("*".to_owned()), 1),
            b'/' if bytes.get(i + 1) == Some(&b'/') => (Token::DoubleSlash, 2),
            b'/' => (Token::Slash, 1),
            b':' if bytes.get(i + 1) == Some(&b':') => (Token::ColonColon, 2),
            b'!' if bytes.get(i + 1) == Some(&b'=') => (Token::Neq, 2),
            b'<' if bytes.get(i + 1) == Some(&b'=') => (Token::Lte, 2),
            b'<' => (Token::Lt, 1),
            b'>' if bytes.get(i + 1) == Some(&b'=') => (Token::Gte, 2),
            b'>' => (Token::Gt, 1),
            b'.' if bytes.get(i + 1) == Some(&b'.') => (Token::DotDot, 2),
            b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => scan_number(expr, i),
            b'.' => (Token::Dot, 1),
            b'0'..=b'9' => scan_number(expr, i),
            b'"' | b'\'' => {
                let body_start = i + 1;
                let Some(end) = expr[body_start..].find(b as char) else {
                    return Err(XPathError::at("Unfinished literal", start));
                };
                let body = &expr[body_start..body_start + end];
                (Token::Literal(body.to_owned()), end + 2)
            }
            b'$' => {
                let name_len = qname_len(&expr[i + 1..]);
                if name_len == 0 {
                    return Err(XPathError::at("Invalid expression", start));
                }
                let name = &expr[i + 1..i + 1 + name_len];
                (Token::Variable(name.to_owned()), name_len + 1)
            }
            _ => {
                let len = name_test_len(&expr[i..]);
                if len == 0 {
                    return Err(XPathError::at("Invalid expression", start));
                }
                (Token::NameTest(expr[i..i + len].to_owned()), len)
            }
        };
        tokens.push(Spanned { token, pos: start });
        i += len;
    }

    Ok(tokens)
}

fn scan_number(expr: &str, start: usize) -> (Token, usize) {
    let rest = &expr[start..];
    let mut seen_dot = false;
    let len = rest
        .bytes()
        .take_while(|&b| {
            if b == b'.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                b.is_ascii_digit()
            }
        })
        .count();
    let value = rest[..len].parse().unwrap_or(f64::NAN);
    (Token::Number(value), len)
}

fn is_ncname_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ncname_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

fn ncname_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_ncname_start(c) => {}
        _ => return 0,
    }
    chars
        .find(|&(_, c)| !is_ncname_char(c))
        .map_or(s.len(), |(i, _)| i)
}

/// Length of a `QName` at the start of `s`, or 0.
fn qname_len(s: &str) -> usize {
    let first = ncname_len(s);
    if first == 0 {
        return 0;
    }
    let rest = &s[first..];
    if rest.starts_with(':') && !rest.starts_with("::") {
        let local = ncname_len(&rest[1..]);
        if local > 0 {
            return first + 1 + local;
        }
    }
    first
}

/// Length of a `QName` or `prefix:*` at the start of `s`, or 0.
fn name_test_len(s: &str) -> usize {
    let first = ncname_len(s);
    if first == 0 {
        return 0;
    }
    if s[first..].starts_with(":*") {
        return first + 2;
    }
    qname_len(s)
}

// ---------------------------------------------------------------------------
// Pass 2: disambiguation
// ---------------------------------------------------------------------------

fn classify(raw: Vec<Spanned>) -> Vec<Spanned> {
    let mut out: Vec<Spanned> = Vec::with_capacity(raw.len());
    for (i, spanned) in raw.iter().enumerate() {
        let operator_position = out.last().is_some_and(|prev| prev.token.ends_operand());
        let next = raw.get(i + 1).map(|s| &s.token);
        let token = match &spanned.token {
            Token::NameTest(name) if operator_position => match name.as_str() {
                "*" => Token::Multiply,
                "and" => Token::And,
                "or" => Token::Or,
                "div" => Token::Div,
                "mod" => Token::Mod,
                _ => Token::NameTest(name.clone()),
            },
            Token::NameTest(name) if name != "*" && next == Some(&Token::LParen) => {
                if matches!(
                    name.as_str(),
                    "node" | "text" | "comment" | "processing-instruction"
                ) {
                    Token::NodeType(name.clone())
                } else {
                    Token::FunctionName(name.clone())
                }
            }
            Token::NameTest(name) if next == Some(&Token::ColonColon) => {
                Token::AxisName(name.clone())
            }
            other => other.clone(),
        };
        out.push(Spanned {
            token,
            pos: spanned.pos,
        });
    }
    out
}
