//! The HTML pre-parse pass.
//!
//! The HTML parser only ever sees ASCII markup: every non-ASCII character
//! is written as a decimal character reference, which it decodes back.
//! Stray ampersands are escaped so they cannot swallow the text after them,
//! and numeric references are normalized. `script`/`style` bodies and
//! comments are copied untouched.

use crate::parser::input::is_xml_char;

/// Elements whose bodies are copied verbatim.
const RAW_TEXT: [&str; 2] = ["script", "style"];

/// Prepares HTML text for parsing without changing what it displays.
///
/// - Numeric references that decode to a safe character are replaced by
///   that character. References to `<`, `>`, `&`, `"` and `'`, and
///   references to characters that are not allowed in documents, are kept.
/// - `&` that does not start a `&name;` or numeric reference becomes
///   `&amp;`.
/// - Non-ASCII characters become `&#N;`.
///
/// Applying it twice gives the same result as applying it once.
///
/// ```
/// use elementfinder::encoding::safe_encode;
///
/// assert_eq!(safe_encode("caf\u{e9} & co"), "caf&#233; &amp; co");
/// assert_eq!(safe_encode("&#65;&#60;&nbsp;"), "A&#60;&nbsp;");
/// assert_eq!(safe_encode("<script>a && b</script>"), "<script>a && b</script>");
/// ```
#[must_use]
pub fn safe_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' if rest.starts_with("<!--") => {
                let end = rest[4..].find("-->").map_or(rest.len(), |i| i + 4 + 3);
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
            '<' if raw_text_start(rest).is_some() => {
                let name = raw_text_start(rest).unwrap_or_default();
                let end = raw_text_end(rest, name);
                out.push_str(&rest[..end]);
                rest = &rest[end..];
            }
            '&' => {
                let consumed = encode_reference(rest, &mut out);
                rest = &rest[consumed..];
            }
            c if c.is_ascii() => {
                out.push(c);
                rest = &rest[1..];
            }
            c => {
                out.push_str("&#");
                out.push_str(&u32::from(c).to_string());
                out.push(';');
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out
}

/// If `s` starts with `<script` or `<style` as a whole tag name, returns
/// the name.
fn raw_text_start(s: &str) -> Option<&'static str> {
    let after_lt = s.get(1..)?;
    RAW_TEXT.into_iter().find(|name| {
        after_lt
            .get(..name.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(name))
            && after_lt[name.len()..]
                .bytes()
                .next()
                .map_or(true, |b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
    })
}

/// Byte offset just past the element's end tag name, or the end of input.
fn raw_text_end(s: &str, name: &str) -> usize {
    let bytes = s.as_bytes();
    let closing_len = name.len() + 2;
    let mut i = 1;
    while i + closing_len <= bytes.len() {
        if bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + closing_len].eq_ignore_ascii_case(name.as_bytes())
        {
            return i + closing_len;
        }
        i += 1;
    }
    bytes.len()
}

/// Handles the `&` at the start of `s`. Returns how many bytes were read.
fn encode_reference(s: &str, out: &mut String) -> usize {
    let body = &s[1..];
    if let Some(numeric) = body.strip_prefix('#') {
        let (digits, radix) = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => (hex, 16),
            None => (numeric, 10),
        };
        let len = digits
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if len > 0 && digits[len..].starts_with(';') {
            let whole = s.len() - digits.len() + len + 1;
            let decoded = u32::from_str_radix(&digits[..len], radix)
                .ok()
                .and_then(char::from_u32)
                .filter(|&c| is_xml_char(c) && !matches!(c, '<' | '>' | '&' | '"' | '\''));
            match decoded {
                Some(c) if c.is_ascii() => out.push(c),
                Some(c) => {
                    out.push_str("&#");
                    out.push_str(&u32::from(c).to_string());
                    out.push(';');
                }
                None => out.push_str(&s[..whole]),
            }
            return whole;
        }
        out.push_str("&amp;");
        return 1;
    }

    let name_len = body
        .bytes()
        .take_while(u8::is_ascii_alphanumeric)
        .count();
    if name_len > 0 && body[name_len..].starts_with(';') {
        out.push_str(&s[..name_len + 2]);
        return name_len + 2;
    }
    out.push_str("&amp;");
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_non_ascii_becomes_references() {
        assert_eq!(safe_encode("\u{442}\u{435}\u{441}\u{442}"), "&#1090;&#1077;&#1089;&#1090;");
        assert_eq!(safe_encode("\u{1F600}"), "&#128512;");
    }

    #[test]
    fn test_stray_ampersands() {
        assert_eq!(safe_encode("a & b"), "a &amp; b");
        assert_eq!(safe_encode("?x=1&y=2"), "?x=1&amp;y=2");
        assert_eq!(safe_encode("&amp;&lt;"), "&amp;&lt;");
        assert_eq!(safe_encode("&#;&#x;"), "&amp;#;&amp;#x;");
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(safe_encode("&#x41;&#66;"), "AB");
        assert_eq!(safe_encode("&#xE9;"), "&#233;");
        assert_eq!(safe_encode("&#38;&#x3C;&#39;"), "&#38;&#x3C;&#39;");
        assert_eq!(safe_encode("&#0;&#99999999;"), "&#0;&#99999999;");
    }

    #[test]
    fn test_comments_and_raw_text_untouched() {
        assert_eq!(safe_encode("<!-- \u{e9} & -->\u{e9}"), "<!-- \u{e9} & -->&#233;");
        assert_eq!(
            safe_encode("<STYLE>a>b{content:'\u{e9}'}</style>&"),
            "<STYLE>a>b{content:'\u{e9}'}</style>&amp;"
        );
        assert_eq!(safe_encode("<scripts>&</scripts>"), "<scripts>&amp;</scripts>");
        assert_eq!(safe_encode("<script>unterminated &"), "<script>unterminated &");
    }

    #[test]
    fn test_idempotent_on_samples() {
        for sample in ["caf\u{e9} &copy &#xE9; &#60;", "<p title='&'>&amp;</p>", "&#65;&#"] {
            let once = safe_encode(sample);
            assert_eq!(safe_encode(&once), once);
        }
    }
}
