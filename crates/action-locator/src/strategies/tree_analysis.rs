use std::collections::BTreeMap;

use async_trait::async_trait;
use element_tree::normalize_text;
use locator_core_types::{BoundingBox, ElementHandle};
use tracing::debug;

use super::{selector_for, verify_match, HealContext, HealingStrategy, StrategyMatch};
use crate::types::ElementFingerprint;

/// Distance at which the position term reaches zero.
const POSITION_RANGE_PX: f64 = 500.0;

/// Scores every visible element of the recorded tag against the fingerprint.
#[derive(Debug, Clone)]
pub struct TreeAnalysisStrategy {
    threshold: f64,
}

impl Default for TreeAnalysisStrategy {
    fn default() -> Self {
        Self { threshold: 0.3 }
    }
}

impl TreeAnalysisStrategy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

/// Weighted similarity in `[0, 1]`: text 0.3, position 0.2, size 0.2,
/// attribute overlap 0.3.
pub fn similarity(
    fingerprint: &ElementFingerprint,
    text: &str,
    rect: &BoundingBox,
    attributes: &BTreeMap<String, String>,
) -> f64 {
    0.3 * text_similarity(fingerprint.text().unwrap_or_default(), text)
        + 0.2 * position_similarity(&fingerprint.bounding_box(), rect)
        + 0.2 * size_similarity(&fingerprint.bounding_box(), rect)
        + 0.3 * attribute_overlap(&fingerprint.attributes, attributes)
}

fn text_similarity(recorded: &str, current: &str) -> f64 {
    let recorded = normalize_text(recorded).to_lowercase();
    let current = normalize_text(current).to_lowercase();
    match (recorded.is_empty(), current.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => strsim::normalized_levenshtein(&recorded, &current),
    }
}

fn position_similarity(recorded: &BoundingBox, current: &BoundingBox) -> f64 {
    let distance = recorded.origin().distance_to(&current.origin());
    1.0 - (distance / POSITION_RANGE_PX).min(1.0)
}

fn size_similarity(recorded: &BoundingBox, current: &BoundingBox) -> f64 {
    let ratio = |a: f64, b: f64| {
        let max = a.max(b);
        if max <= 0.0 {
            1.0
        } else {
            a.min(b) / max
        }
    };
    (ratio(recorded.width, current.width) + ratio(recorded.height, current.height)) / 2.0
}

fn attribute_overlap(
    recorded: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> f64 {
    let total = recorded.len().max(current.len());
    if total == 0 {
        return 1.0;
    }
    let shared = recorded
        .iter()
        .filter(|(k, v)| current.get(*k) == Some(*v))
        .count();
    shared as f64 / total as f64
}

#[async_trait]
impl HealingStrategy for TreeAnalysisStrategy {
    fn name(&self) -> &'static str {
        "tree-analysis"
    }

    fn default_priority(&self) -> i32 {
        40
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        let elements = ctx.tree.find_all(&ctx.fingerprint.tag_name).await.ok()?;
        let mut best: Option<(f64, ElementHandle)> = None;
        for element in elements {
            let Ok(rect) = ctx.tree.bounding_box(element).await else {
                continue;
            };
            if !rect.is_visible() {
                continue;
            }
            let (Ok(text), Ok(attributes)) = (
                ctx.tree.text(element).await,
                ctx.tree.attributes(element).await,
            ) else {
                continue;
            };
            let score = similarity(ctx.fingerprint, &text, &rect, &attributes);
            debug!("[tree-analysis] {} scored {:.3}", element, score);
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, element));
            }
        }

        let (score, element) = best?;
        if score <= self.threshold || !verify_match(ctx.tree, element, ctx.fingerprint).await {
            return None;
        }
        Some(StrategyMatch {
            selector: selector_for(ctx, element).await?,
            element,
            confidence: score.clamp(0.0, 1.0),
        })
    }
}
