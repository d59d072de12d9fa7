//! Encoding detection, transcoding and the HTML pre-parse pass.
//!
//! Byte input is turned into UTF-8 before any parser sees it:
//!
//! 1. A Byte Order Mark wins.
//! 2. Otherwise a declared encoding is looked up, from the XML declaration
//!    or an HTML `<meta charset>`.
//! 3. Otherwise the bytes must be UTF-8. HTML falls back to windows-1252,
//!    the way browsers do.
//!
//! [`safe_encode`] is the text-level pass applied to HTML before parsing.

mod safe;

pub use safe::safe_encode;

use thiserror::Error;

/// How far into the input declarations are searched for.
const SNIFF_LIMIT: usize = 1024;

/// Transcoding failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("encoding error: {message}")]
pub struct EncodingError {
    /// What went wrong.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Detects a Byte Order Mark.
///
/// Returns the encoding label and the number of BOM bytes to skip.
///
/// ```
/// use elementfinder::encoding::detect_encoding;
///
/// assert_eq!(detect_encoding(b"\xEF\xBB\xBFhello"), ("UTF-8", 3));
/// assert_eq!(detect_encoding(b"\xFF\xFE<\x00"), ("UTF-16LE", 2));
/// assert_eq!(detect_encoding(b"<root/>"), ("UTF-8", 0));
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static str, usize) {
    match bytes {
        [0xEF, 0xBB, 0xBF, ..] => ("UTF-8", 3),
        [0xFE, 0xFF, ..] => ("UTF-16BE", 2),
        [0xFF, 0xFE, ..] => ("UTF-16LE", 2),
        _ => ("UTF-8", 0),
    }
}

/// Transcodes `bytes` from the encoding called `label` into UTF-8.
///
/// # Errors
///
/// Returns an error for unknown labels and malformed byte sequences.
pub fn transcode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let encoding = encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::new(format!("unsupported encoding: {label}")))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {label}"
        )));
    }
    Ok(text.into_owned())
}

/// Reads the `encoding` pseudo-attribute of a leading XML declaration.
///
/// Only ASCII bytes are inspected, so this works on undecoded input.
///
/// ```
/// use elementfinder::encoding::extract_xml_decl_encoding;
///
/// let decl = b"<?xml version=\"1.0\" encoding='ISO-8859-1'?><r/>";
/// assert_eq!(extract_xml_decl_encoding(decl).as_deref(), Some("ISO-8859-1"));
/// assert_eq!(extract_xml_decl_encoding(b"<r/>"), None);
/// ```
#[must_use]
pub fn extract_xml_decl_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(SNIFF_LIMIT)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = find_bytes(scan, b"?>")?;
    let decl = &scan[..end];
    let after = &decl[find_bytes(decl, b"encoding")? + b"encoding".len()..];
    let after = skip_ascii_whitespace(after).strip_prefix(b"=")?;
    let after = skip_ascii_whitespace(after);
    let (&quote, rest) = after.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = rest.iter().position(|&b| b == quote)?;
    ascii_label(&rest[..len])
}

/// Finds the charset declared by an HTML `<meta>` tag, either
/// `<meta charset="...">` or the `content="text/html; charset=..."` form.
///
/// ```
/// use elementfinder::encoding::extract_meta_charset;
///
/// let html = b"<head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1251\">";
/// assert_eq!(extract_meta_charset(html).as_deref(), Some("windows-1251"));
/// ```
#[must_use]
pub fn extract_meta_charset(bytes: &[u8]) -> Option<String> {
    let scan = bytes[..bytes.len().min(SNIFF_LIMIT)].to_ascii_lowercase();
    let mut rest = scan.as_slice();
    while let Some(start) = find_bytes(rest, b"<meta") {
        let tag = &rest[start..];
        let tag = &tag[..tag.iter().position(|&b| b == b'>').unwrap_or(tag.len())];
        if let Some(pos) = find_bytes(tag, b"charset") {
            let after = skip_ascii_whitespace(&tag[pos + b"charset".len()..]);
            if let Some(after) = after.strip_prefix(b"=") {
                let after = skip_ascii_whitespace(after);
                let after = after
                    .strip_prefix(b"\"")
                    .or_else(|| after.strip_prefix(b"'"))
                    .unwrap_or(after);
                let len = after
                    .iter()
                    .position(|&b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')))
                    .unwrap_or(after.len());
                if let Some(label) = ascii_label(&after[..len]) {
                    return Some(label);
                }
            }
        }
        rest = &rest[start + b"<meta".len()..];
    }
    None
}

/// Decodes XML bytes into UTF-8.
///
/// # Errors
///
/// Returns an error when the bytes are not valid in the detected encoding,
/// or when the declared encoding is unknown.
///
/// ```
/// use elementfinder::encoding::decode_to_utf8;
///
/// let latin1 = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><r>caf\xE9</r>";
/// assert!(decode_to_utf8(latin1).unwrap().contains("caf\u{e9}"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (bom, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];
    if skip > 0 {
        return transcode(content, bom);
    }
    if let Some(declared) = extract_xml_decl_encoding(content) {
        if !is_utf8_label(&declared) {
            return transcode(content, &declared);
        }
    }
    std::str::from_utf8(content)
        .map(str::to_owned)
        .map_err(|_| EncodingError::new("input is not valid UTF-8"))
}

/// Decodes HTML bytes into UTF-8. Never fails.
///
/// Undeclared input that is not valid UTF-8 is read as windows-1252.
/// Malformed sequences in a declared encoding become U+FFFD.
#[must_use]
pub fn decode_html_to_utf8(bytes: &[u8]) -> String {
    let (bom, skip) = detect_encoding(bytes);
    let content = &bytes[skip..];
    let declared = if skip > 0 {
        Some(bom.to_owned())
    } else {
        extract_meta_charset(content).or_else(|| extract_xml_decl_encoding(content))
    };
    let encoding = declared
        .as_deref()
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .or_else(|| std::str::from_utf8(content).is_ok().then_some(encoding_rs::UTF_8))
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _) = encoding.decode_without_bom_handling(content);
    text.into_owned()
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

fn ascii_label(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() || !bytes.is_ascii() {
        return None;
    }
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

fn is_utf8_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("utf-8") || label.eq_ignore_ascii_case("utf8")
}
