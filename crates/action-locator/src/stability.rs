//! Offline durability score for existing selectors.

use std::collections::HashMap;

use element_tree::ElementTree;
use locator_core_types::ElementHandle;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use crate::fingerprint::ancestors;
use crate::heuristics::{unstable_class_count, TEST_ATTRIBUTES};

static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'[^']*'"#).expect("quoted string pattern"));
static CLASS_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[A-Za-z_\\-]").expect("class segment pattern"));
static ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":nth-(?:child|of-type)|:first-child|:last-child|\[\d+\]")
        .expect("ordinal pattern")
});

const MAX_DEPTH: usize = 10;
const LONG_SELECTOR: usize = 100;

/// Scores how likely a selector is to keep matching its element, in `[0, 1]`.
///
/// Results are cached per `(selector, element)` until [`Self::clear`].
#[derive(Debug, Default)]
pub struct StabilityEvaluator {
    cache: Mutex<HashMap<(String, ElementHandle), f64>>,
}

impl StabilityEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn evaluate(
        &self,
        tree: &dyn ElementTree,
        selector: &str,
        element: ElementHandle,
    ) -> f64 {
        let key = (selector.to_string(), element);
        if let Some(score) = self.cache.lock().get(&key) {
            return *score;
        }

        let score = match tree.find_all(selector).await {
            Ok(matches) => {
                let uniqueness = if matches.len() == 1 { 0.3 } else { -0.2 };
                let element_score = element_score(tree, element).await;
                (uniqueness + selector_score(selector) + 0.2 * element_score).clamp(0.0, 1.0)
            }
            Err(err) => {
                debug!("Stability of '{}' is 0: {}", selector, err);
                0.0
            }
        };
        self.cache.lock().insert(key, score);
        score
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Marker bonuses and shape penalties of the selector text.
pub fn selector_score(selector: &str) -> f64 {
    let bare = QUOTED.replace_all(selector, "");
    let mut score = 0.0;
    if bare.contains('#') {
        score += 0.3;
    }
    if bare.contains("data-testid") {
        score += 0.25;
    } else if TEST_ATTRIBUTES.iter().any(|attr| bare.contains(attr)) {
        score += 0.2;
    }
    if bare.contains("aria-") {
        score += 0.15;
    }
    if bare.contains("[name") || bare.contains("@name") {
        score += 0.1;
    }
    if ORDINAL.is_match(&bare) {
        score -= 0.2;
    }
    if CLASS_SEGMENT.find_iter(&bare).count() > 3 {
        score -= 0.1;
    }
    if selector.chars().count() > LONG_SELECTOR {
        score -= 0.1;
    }
    score
}

async fn element_score(tree: &dyn ElementTree, element: ElementHandle) -> f64 {
    let Ok(attributes) = tree.attributes(element).await else {
        return 0.0;
    };
    let present = |name: &str| attributes.get(name).map_or(false, |v| !v.trim().is_empty());
    let mut score = 0.5;
    if present("id") {
        score += 0.3;
    }
    if present("data-testid") {
        score += 0.3;
    }
    if present("name") {
        score += 0.2;
    }
    if present("aria-label") {
        score += 0.2;
    }
    if let Some(classes) = attributes.get("class") {
        score -= 0.1 * unstable_class_count(classes) as f64;
    }
    if let Ok(chain) = ancestors(tree, element).await {
        if chain.len() > MAX_DEPTH {
            score -= 0.1;
        }
    }
    score
}
