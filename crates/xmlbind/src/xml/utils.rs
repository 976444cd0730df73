//! Utility functions and constants for XML reading and writing.

use std::borrow::Cow;

use quick_xml::escape::{escape, partial_escape};

/// UTF-8 byte-order mark written at the start of every saved file.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Strips a leading UTF-8 byte-order mark, if present.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Escapes element text. Line breaks become character references so that
/// they survive indentation and end-of-line normalisation.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    entitize(partial_escape(text), false)
}

/// Escapes an attribute value, including line breaks and tabs.
pub fn escape_attribute(text: &str) -> Cow<'_, str> {
    entitize(escape(text), true)
}

fn entitize(escaped: Cow<'_, str>, tabs: bool) -> Cow<'_, str> {
    let needs = |c: char| c == '\r' || c == '\n' || (tabs && c == '\t');
    if !escaped.contains(needs) {
        return escaped;
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        match c {
            '\r' => out.push_str("&#xD;"),
            '\n' => out.push_str("&#xA;"),
            '\t' if tabs => out.push_str("&#x9;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Writes every whitespace character as a character reference.
pub fn escape_whitespace(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' ' => "&#x20;".to_string(),
            '\t' => "&#x9;".to_string(),
            '\r' => "&#xD;".to_string(),
            '\n' => "&#xA;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

/// Whether a text node is ignorable whitespace between elements.
pub fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}
