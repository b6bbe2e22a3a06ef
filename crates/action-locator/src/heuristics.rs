//! Heuristics for identifiers and classes that change between renders.

use once_cell::sync::Lazy;
use regex::Regex;

static GENERATED_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        ^\d
        | \d{3,}
        | ^(?:ember|ext-gen|yui_|react-|radix-|mui-|headlessui-|:r)
        | [0-9a-f]{8}-[0-9a-f]{4}
        ",
    )
    .expect("generated id pattern")
});

static GENERATED_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:css|sc|jsx|emotion|svelte|styled)-[A-Za-z0-9_-]+$|__[A-Za-z0-9]{5,}$|\d{3,}")
        .expect("generated class pattern")
});

static STATE_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:active|selected|checked|current|focus(?:ed)?|hover(?:ed)?|disabled|open|opened|closed|hidden|visible|loading|ng-[a-z-]+|is-[a-z-]+|has-[a-z-]+)$",
    )
    .expect("state class pattern")
});

/// Attributes conventionally reserved for test automation.
pub const TEST_ATTRIBUTES: &[&str] = &[
    "data-testid",
    "data-test",
    "data-test-id",
    "data-cy",
    "data-qa",
];

/// Whether an id looks framework-generated.
pub fn looks_generated_id(id: &str) -> bool {
    let id = id.trim();
    id.is_empty() || GENERATED_ID.is_match(id) || is_hash_like(id, 8)
}

/// Alphanumeric token mixing letters with at least two digits.
fn is_hash_like(token: &str, min_len: usize) -> bool {
    token.len() >= min_len
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().filter(|c| c.is_ascii_digit()).count() >= 2
}

/// Whether a class token is likely to survive a re-render.
pub fn is_stable_class(class: &str) -> bool {
    !(class.is_empty()
        || GENERATED_CLASS.is_match(class)
        || STATE_CLASS.is_match(class)
        || is_hash_like(class, 6))
}

pub fn stable_classes(class_attr: &str) -> Vec<String> {
    class_attr
        .split_whitespace()
        .filter(|c| is_stable_class(c))
        .map(str::to_string)
        .collect()
}

pub fn unstable_class_count(class_attr: &str) -> usize {
    class_attr
        .split_whitespace()
        .filter(|c| !is_stable_class(c))
        .count()
}

pub fn is_test_attribute(name: &str) -> bool {
    TEST_ATTRIBUTES
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}
