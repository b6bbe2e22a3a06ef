//! Selector string escaping.

use cssparser::{serialize_identifier, serialize_string};

pub use element_tree::normalize_text as normalize_whitespace;

/// Escapes `value` for use as a CSS identifier.
pub fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let _ = serialize_identifier(value, &mut out);
    out
}

/// Double-quoted CSS string literal.
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    let _ = serialize_string(value, &mut out);
    out
}

/// XPath string literal; falls back to `concat()` when both quote kinds occur.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// `[name="value"]`, optionally prefixed with a tag.
pub fn attribute_selector(tag: Option<&str>, name: &str, value: &str) -> String {
    format!(
        "{}[{}={}]",
        tag.unwrap_or_default(),
        css_escape(name),
        css_string(value)
    )
}
