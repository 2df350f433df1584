// Minimal XML helpers for the R710's ajax-request dialect.
//
// The appliance speaks a small, flat XML subset: attribute-only elements,
// single-quoted values, no namespaces, no text nodes we care about. A full
// XML parser buys nothing here; a scanner that extracts named elements and
// their attributes covers every response shape the firmware produces.

use std::collections::HashMap;

/// Escape a string for use inside a single-quoted XML attribute.
pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// A scanned element: tag name plus its attributes.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub attrs: HashMap<String, String>,
}

impl Element {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Extract every `<tag ...>` element from `xml`, in document order.
///
/// Only the start tag's attributes are read; children and text content are
/// ignored. Matches whole tag names (`<wlansvc ` does not match
/// `<wlansvc-list`).
pub(crate) fn elements_named(xml: &str, tag: &str) -> Vec<Element> {
    let mut found = Vec::new();
    let needle = format!("<{tag}");
    let mut rest = xml;

    while let Some(pos) = rest.find(&needle) {
        let after = &rest[pos + needle.len()..];
        // Reject prefix matches like `<wlansvc-list` when scanning for `wlansvc`.
        let boundary = after.chars().next();
        if matches!(boundary, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            if let Some(end) = after.find('>') {
                found.push(Element {
                    attrs: parse_attrs(&after[..end]),
                });
                rest = &after[end + 1..];
                continue;
            }
            break; // unterminated tag
        }
        rest = &rest[pos + needle.len()..];
    }
    found
}

/// First `<tag ...>` element in `xml`, if any.
pub(crate) fn first_element(xml: &str, tag: &str) -> Option<Element> {
    elements_named(xml, tag).into_iter().next()
}

/// Parse `name='value'` pairs from the inside of a start tag.
/// Accepts both quote styles; values are entity-unescaped.
fn parse_attrs(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    let bytes = raw.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        // Skip whitespace and stray slashes.
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        let name_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            break;
        }
        let name = raw[name_start..i].trim().to_owned();
        i += 1; // consume '='
        if i >= bytes.len() || (bytes[i] != b'\'' && bytes[i] != b'"') {
            break;
        }
        let quote = bytes[i];
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != quote {
            i += 1;
        }
        if i >= bytes.len() {
            break; // unterminated value
        }
        attrs.insert(name, unescape(&raw[value_start..i]));
        i += 1; // consume closing quote
    }
    attrs
}
