//! Regex patterns for string collections.
//!
//! Patterns may be written with delimiters and trailing flags, as in
//! `!<price value="([^"]+)"!iu` or `/\d+/`, or bare (`\d+`). A pattern is
//! delimited when its first character is ASCII punctuation other than a
//! backslash or an opening bracket, and the same character appears again
//! followed only by letters. The letters are flags:
//!
//! | flag | meaning                                   |
//! |------|-------------------------------------------|
//! | `i`  | case-insensitive                          |
//! | `m`  | `^` and `$` match at line boundaries      |
//! | `s`  | `.` matches newlines                      |
//! | `x`  | whitespace and `#` comments are ignored   |
//! | `u`  | accepted; patterns are always Unicode     |
//!
//! Matching is backed by `fancy-regex`, so look-around and back-references
//! are available.

use fancy_regex::{Captures, Regex, RegexBuilder};

use crate::error::Error;

/// A compiled pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compiles a delimited or bare pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] for unknown flags and for patterns
    /// the regex engine rejects.
    ///
    /// ```
    /// use elementfinder::pattern::Pattern;
    ///
    /// let p = Pattern::new("!^\\$(.+)!iu").unwrap();
    /// assert_eq!(p.replace_all("$5.95", "$1 USD").unwrap(), "5.95 USD");
    /// assert!(Pattern::new("/a/q").is_err());
    /// ```
    ///
    /// A bare pattern that starts with punctuation and repeats it later is
    /// read as delimited: `.b.` compiles to `b`. Escape the first character,
    /// or wrap the pattern in delimiters, to keep it whole:
    ///
    /// ```
    /// use elementfinder::pattern::Pattern;
    ///
    /// assert!(Pattern::new(".b.").unwrap().is_match("abc").unwrap());
    /// assert!(!Pattern::new("\\.b.").unwrap().is_match("abc").unwrap());
    /// assert!(!Pattern::new("/.b./").unwrap().is_match("bc").unwrap());
    /// ```
    pub fn new(source: &str) -> Result<Self, Error> {
        let (body, flags) = split_delimiters(source);
        let mut builder = RegexBuilder::new(body);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.verbose_mode(true);
                }
                'u' => {}
                other => {
                    return Err(Error::invalid_pattern(
                        source,
                        format!("Unknown modifier '{other}'"),
                    ))
                }
            }
        }
        let regex = builder
            .build()
            .map_err(|e| Error::invalid_pattern(source, e))?;
        Ok(Self {
            source: source.to_owned(),
            regex,
        })
    }

    /// The pattern as it was written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of capture groups, not counting the whole match.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }

    /// Returns `true` if the pattern matches anywhere in `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backtracking limit is exceeded.
    pub fn is_match(&self, text: &str) -> Result<bool, Error> {
        self.regex
            .is_match(text)
            .map_err(|e| Error::invalid_pattern(&self.source, e))
    }

    /// Replaces every match. The replacement may refer to groups as `$1`,
    /// `${1}` or `\1` (one or two digits); `$0` is the whole match and
    /// groups that did not take part in a match expand to nothing. `\\`
    /// is a literal backslash.
    ///
    /// # Errors
    ///
    /// Returns an error if the backtracking limit is exceeded.
    pub fn replace_all(&self, text: &str, replacement: &str) -> Result<String, Error> {
        let template = Template::parse(replacement);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in self.regex.captures_iter(text) {
            let caps = caps.map_err(|e| Error::invalid_pattern(&self.source, e))?;
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            template.expand(&caps, &mut out);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Group `group` of every match, in order.
    ///
    /// A group the pattern does not have yields nothing. A group that exists
    /// but did not participate in a match yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the backtracking limit is exceeded.
    pub fn captures_all(&self, text: &str, group: usize) -> Result<Vec<String>, Error> {
        if group > self.group_count() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for caps in self.regex.captures_iter(text) {
            let caps = caps.map_err(|e| Error::invalid_pattern(&self.source, e))?;
            out.push(
                caps.get(group)
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_default(),
            );
        }
        Ok(out)
    }

    /// Splits `text` around every match. Empty pieces are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the backtracking limit is exceeded.
    pub fn split(&self, text: &str) -> Result<Vec<String>, Error> {
        let mut pieces = Vec::new();
        let mut last = 0;
        for found in self.regex.find_iter(text) {
            let found = found.map_err(|e| Error::invalid_pattern(&self.source, e))?;
            // An empty match in empty text splits nothing.
            if found.start() == found.end() && found.start() == 0 && text.is_empty() {
                continue;
            }
            pieces.push(text[last..found.start()].to_owned());
            last = found.end();
        }
        pieces.push(text[last..].to_owned());
        Ok(pieces)
    }
}

/// Splits `!body!flags` into body and flags. Bare patterns have no flags.
fn split_delimiters(source: &str) -> (&str, &str) {
    let trimmed = source.trim_start();
    let Some(delimiter) = trimmed.chars().next() else {
        return (source, "");
    };
    if !delimiter.is_ascii_punctuation() || matches!(delimiter, '\\' | '(' | '[' | '{' | '<') {
        return (source, "");
    }
    let inner = &trimmed[1..];
    let Some(close) = inner.rfind(delimiter) else {
        return (source, "");
    };
    let flags = &inner[close + 1..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return (source, "");
    }
    (&inner[..close], flags)
}

// --- Replacement templates ---

#[derive(Debug)]
enum Piece<'a> {
    Literal(&'a str),
    Backslash,
    Group(usize),
}

#[derive(Debug)]
struct Template<'a> {
    pieces: Vec<Piece<'a>>,
}

impl<'a> Template<'a> {
    fn parse(replacement: &'a str) -> Self {
        let bytes = replacement.as_bytes();
        let mut pieces = Vec::new();
        let mut literal_start = 0;
        let mut i = 0;
        while i < bytes.len() {
            let reference = match bytes[i] {
                b'\\' if bytes.get(i + 1) == Some(&b'\\') => Some((Piece::Backslash, 2)),
                b'\\' => group_digits(&bytes[i + 1..]).map(|(n, len)| (Piece::Group(n), len + 1)),
                b'$' if bytes.get(i + 1) == Some(&b'{') => group_digits(&bytes[i + 2..])
                    .filter(|&(_, len)| bytes.get(i + 2 + len) == Some(&b'}'))
                    .map(|(n, len)| (Piece::Group(n), len + 3)),
                b'$' => group_digits(&bytes[i + 1..]).map(|(n, len)| (Piece::Group(n), len + 1)),
                _ => None,
            };
            match reference {
                Some((piece, len)) => {
                    if literal_start < i {
                        pieces.push(Piece::Literal(&replacement[literal_start..i]));
                    }
                    pieces.push(piece);
                    i += len;
                    literal_start = i;
                }
                None => i += 1,
            }
        }
        if literal_start < replacement.len() {
            pieces.push(Piece::Literal(&replacement[literal_start..]));
        }
        Self { pieces }
    }

    fn expand(&self, caps: &Captures<'_>, out: &mut String) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Backslash => out.push('\\'),
                Piece::Group(n) => {
                    if let Some(m) = caps.get(*n) {
                        out.push_str(m.as_str());
                    }
                }
            }
        }
    }
}

/// Reads one or two ASCII digits.
fn group_digits(bytes: &[u8]) -> Option<(usize, usize)> {
    let len = bytes
        .iter()
        .take(2)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if len == 0 {
        return None;
    }
    let n = bytes[..len]
        .iter()
        .fold(0, |acc, b| acc * 10 + usize::from(b - b'0'));
    Some((n, len))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delimiter_detection() {
        assert_eq!(split_delimiters("!\\d+!iu"), ("\\d+", "iu"));
        assert_eq!(split_delimiters("/a/b/"), ("a/b", ""));
        assert_eq!(split_delimiters("#x#s"), ("x", "s"));
        assert_eq!(split_delimiters("\\d+"), ("\\d+", ""));
        assert_eq!(split_delimiters("(\\d)"), ("(\\d)", ""));
        assert_eq!(split_delimiters(".*x.*"), (".*x.*", ""));
        assert_eq!(split_delimiters("[a-z]+"), ("[a-z]+", ""));
        assert_eq!(split_delimiters(".b."), ("b", ""));
        assert_eq!(split_delimiters("\\.b."), ("\\.b.", ""));
    }

    #[test]
    fn test_flags() {
        let p = Pattern::new("/abc/i").unwrap();
        assert!(p.is_match("xABCx").unwrap());
        let p = Pattern::new("/^b$/m").unwrap();
        assert!(p.is_match("a\nb\nc").unwrap());
        let p = Pattern::new("/a.b/s").unwrap();
        assert!(p.is_match("a\nb").unwrap());
        let p = Pattern::new("/a b # comment\n/x").unwrap();
        assert!(p.is_match("ab").unwrap());
    }

    #[test]
    fn test_invalid_patterns() {
        let err = Pattern::new("/a/q").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidPattern {
                pattern: "/a/q".into(),
                reason: "Unknown modifier 'q'".into()
            }
        );
        assert!(matches!(Pattern::new("/(a/"), Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_captures_all_flattens_matches() {
        let p = Pattern::new("/(\\w)(\\d)?/").unwrap();
        assert_eq!(p.captures_all("a1 b c3", 2).unwrap(), ["1", "", "3"]);
        assert_eq!(p.captures_all("a1", 0).unwrap(), ["a1"]);
        assert!(p.captures_all("a1", 3).unwrap().is_empty());
    }

    #[test]
    fn test_replacement_references() {
        let p = Pattern::new("/(\\w+)@(\\w+)/").unwrap();
        assert_eq!(p.replace_all("me@host", "$2:$1").unwrap(), "host:me");
        assert_eq!(p.replace_all("me@host", "${1}1").unwrap(), "me1");
        assert_eq!(p.replace_all("me@host", "\\2").unwrap(), "host");
        assert_eq!(p.replace_all("me@host", "$9|\\\\|$").unwrap(), "|\\|$");
        assert_eq!(p.replace_all("me@host", "[$0]").unwrap(), "[me@host]");
    }

    #[test]
    fn test_look_around() {
        let p = Pattern::new("/\\d+(?= USD)/").unwrap();
        assert_eq!(p.captures_all("5 EUR, 7 USD", 0).unwrap(), ["7"]);
    }

    #[test]
    fn test_split() {
        let p = Pattern::new("/\\s*,\\s*/").unwrap();
        assert_eq!(p.split("a , b,c").unwrap(), ["a", "b", "c"]);
        assert_eq!(p.split(",a,").unwrap(), ["", "a", ""]);
        assert_eq!(p.split("").unwrap(), [""]);
    }
}
