//! Healing strategies
//!
//! Each strategy re-locates a fingerprinted element from one signal and
//! verifies its own match before reporting it. Strategies hold no state
//! between attempts; order and enablement live in the
//! [`StrategyRegistry`](crate::registry::StrategyRegistry).

pub mod attribute;
pub mod fuzzy;
pub mod hierarchy;
pub mod position;
pub mod text;
pub mod tree_analysis;

pub use attribute::AttributeStrategy;
pub use fuzzy::FuzzyStrategy;
pub use hierarchy::HierarchyStrategy;
pub use position::PositionStrategy;
pub use text::TextStrategy;
pub use tree_analysis::TreeAnalysisStrategy;

use async_trait::async_trait;
use element_tree::{normalize_text, ElementTree};
use locator_core_types::ElementHandle;
use tracing::debug;

use crate::generator::CandidateGenerator;
use crate::types::ElementFingerprint;

/// Inputs shared by every strategy attempt.
pub struct HealContext<'a> {
    pub tree: &'a dyn ElementTree,
    pub fingerprint: &'a ElementFingerprint,
    pub original_selector: &'a str,
    pub generator: &'a CandidateGenerator,
}

/// Verified match reported by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyMatch {
    pub selector: String,
    pub element: ElementHandle,
    pub confidence: f64,
}

/// Strategy trait for element healing
#[async_trait]
pub trait HealingStrategy: Send + Sync {
    /// Get strategy name
    fn name(&self) -> &'static str;

    /// Priority used when the registry has no override
    fn default_priority(&self) -> i32;

    /// Attempt to re-locate the fingerprinted element
    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch>;
}

/// Tag must match; when text was recorded, the current text must contain it.
pub async fn verify_match(
    tree: &dyn ElementTree,
    element: ElementHandle,
    fingerprint: &ElementFingerprint,
) -> bool {
    match tree.tag_name(element).await {
        Ok(tag) if tag.eq_ignore_ascii_case(&fingerprint.tag_name) => {}
        _ => return false,
    }
    let Some(expected) = fingerprint.text() else {
        return true;
    };
    let expected = normalize_text(expected).to_lowercase();
    match tree.text(element).await {
        Ok(actual) => {
            let actual = normalize_text(&actual).to_lowercase();
            actual.contains(&expected)
        }
        Err(_) => false,
    }
}

/// First element matched by `selector`, if it verifies.
pub(crate) async fn try_selector(
    ctx: &HealContext<'_>,
    strategy: &str,
    selector: &str,
    confidence: f64,
) -> Option<StrategyMatch> {
    let element = match ctx.tree.find(selector).await {
        Ok(Some(element)) => element,
        Ok(None) => return None,
        Err(err) => {
            debug!("[{}] skipping '{}': {}", strategy, selector, err);
            return None;
        }
    };
    if !verify_match(ctx.tree, element, ctx.fingerprint).await {
        debug!("[{}] '{}' matched an element that failed verification", strategy, selector);
        return None;
    }
    Some(StrategyMatch {
        selector: selector.to_string(),
        element,
        confidence,
    })
}

/// Selector for an element found without one: the generator's pick, else
/// its absolute path.
pub(crate) async fn selector_for(ctx: &HealContext<'_>, element: ElementHandle) -> Option<String> {
    match ctx.generator.generate_selector(ctx.tree, element).await {
        Ok(candidate) => Some(candidate.selector),
        Err(_) => ctx.generator.absolute_xpath(ctx.tree, element).await.ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use element_tree::{MemoryElement, MemoryTree};
    use locator_core_types::{Point, Size};
    use std::collections::BTreeMap;

    fn recorded_button(text: &str) -> ElementFingerprint {
        ElementFingerprint {
            tag_name: "button".into(),
            attributes: BTreeMap::new(),
            text_content: Some(text.into()),
            position: Point::new(0.0, 0.0),
            size: Size::new(80.0, 30.0),
            ancestor_path: Vec::new(),
        }
    }

    async fn verify_text(current: &str, recorded: &str) -> bool {
        let tree = MemoryTree::from_root(
            MemoryElement::new("html").child(
                MemoryElement::new("body")
                    .child(MemoryElement::new("button").text(current).rect(0.0, 0.0, 80.0, 30.0)),
            ),
        );
        let button = tree.find("button").await.unwrap().unwrap();
        verify_match(&tree, button, &recorded_button(recorded)).await
    }

    #[tokio::test]
    async fn test_shorter_text_does_not_verify() {
        assert!(!verify_text("Sign", "Sign In to continue").await);
        assert!(verify_text("Sign In to continue now", "Sign In to continue").await);
        assert!(verify_text("  sign in TO continue ", "Sign In to continue").await);
    }

    #[tokio::test]
    async fn test_tag_mismatch_does_not_verify() {
        let tree = MemoryTree::from_root(
            MemoryElement::new("html")
                .child(MemoryElement::new("body").child(MemoryElement::new("a").text("Sign In"))),
        );
        let link = tree.find("a").await.unwrap().unwrap();
        assert!(!verify_match(&tree, link, &recorded_button("Sign In")).await);
    }
}
