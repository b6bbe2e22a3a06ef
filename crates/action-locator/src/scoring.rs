//! Candidate scoring.

use crate::types::SelectorType;

const ANCHOR_BONUS: f64 = 3.0;
const UNIQUE_BONUS: f64 = 5.0;
const AMBIGUOUS_PENALTY: f64 = 3.0;

/// Score of a candidate given how many elements it matched.
///
/// Zero matches neither earns nor loses the uniqueness adjustment.
pub fn score_candidate(selector_type: SelectorType, selector: &str, match_count: usize) -> f64 {
    let mut score = selector_type.weight();
    if selector_type.is_anchor() {
        score += ANCHOR_BONUS;
    }
    match match_count {
        0 => {}
        1 => score += UNIQUE_BONUS,
        _ => score -= AMBIGUOUS_PENALTY,
    }
    score -= selector.chars().count() as f64 / 100.0;
    score -= 0.5 * count_combinators(selector) as f64;
    score.max(0.0)
}

/// Counts CSS combinators outside strings, brackets and parentheses.
pub fn count_combinators(selector: &str) -> usize {
    let mut count = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut after_combinator = true;
    let mut chars = selector.trim().chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '\\' => {
                chars.next();
            }
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth > 0 || matches!(c, ']' | ')' | '"' | '\'' | '\\') {
            if pending_space && !after_combinator {
                count += 1;
            }
            pending_space = false;
            after_combinator = false;
            continue;
        }
        match c {
            '>' | '+' | '~' => {
                count += 1;
                pending_space = false;
                after_combinator = true;
            }
            ',' => {
                pending_space = false;
                after_combinator = true;
            }
            c if c.is_whitespace() => pending_space = true,
            _ => {
                if pending_space && !after_combinator {
                    count += 1;
                }
                pending_space = false;
                after_combinator = false;
            }
        }
    }
    count
}
