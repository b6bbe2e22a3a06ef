use async_trait::async_trait;
use element_tree::ElementTree;
use locator_core_types::{BoundingBox, ElementHandle};

use super::{selector_for, verify_match, HealContext, HealingStrategy, StrategyMatch};

const CONFIDENCE: f64 = 0.5;
/// Parents checked when the hit-tested element is a descendant of the target.
const HIT_TEST_CLIMB: usize = 3;

/// Re-locates by recorded geometry.
#[derive(Debug, Clone)]
pub struct PositionStrategy {
    tolerance: f64,
}

impl Default for PositionStrategy {
    fn default() -> Self {
        Self { tolerance: 50.0 }
    }
}

impl PositionStrategy {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    fn within_tolerance(&self, recorded: &BoundingBox, current: &BoundingBox) -> bool {
        current.is_visible()
            && (current.x - recorded.x).abs() <= self.tolerance
            && (current.y - recorded.y).abs() <= self.tolerance
            && (current.width - recorded.width).abs() <= self.tolerance
            && (current.height - recorded.height).abs() <= self.tolerance
    }

    async fn accepts(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
        ctx: &HealContext<'_>,
    ) -> bool {
        let recorded = ctx.fingerprint.bounding_box();
        match tree.bounding_box(element).await {
            Ok(current) if self.within_tolerance(&recorded, &current) => {
                verify_match(tree, element, ctx.fingerprint).await
            }
            _ => false,
        }
    }

    async fn hit_test(&self, ctx: &HealContext<'_>) -> Option<ElementHandle> {
        let center = ctx.fingerprint.bounding_box().center();
        let mut current = ctx
            .tree
            .element_at_point(center.x, center.y)
            .await
            .ok()
            .flatten();
        for _ in 0..=HIT_TEST_CLIMB {
            let element = current?;
            if self.accepts(ctx.tree, element, ctx).await {
                return Some(element);
            }
            current = ctx.tree.parent(element).await.ok().flatten();
        }
        None
    }

    async fn scan(&self, ctx: &HealContext<'_>) -> Option<ElementHandle> {
        let recorded = ctx.fingerprint.bounding_box().origin();
        let elements = ctx.tree.find_all(&ctx.fingerprint.tag_name).await.ok()?;
        let mut best: Option<(f64, ElementHandle)> = None;
        for element in elements {
            if !self.accepts(ctx.tree, element, ctx).await {
                continue;
            }
            let Ok(rect) = ctx.tree.bounding_box(element).await else {
                continue;
            };
            let distance = rect.origin().distance_to(&recorded);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, element));
            }
        }
        best.map(|(_, element)| element)
    }
}

#[async_trait]
impl HealingStrategy for PositionStrategy {
    fn name(&self) -> &'static str {
        "position"
    }

    fn default_priority(&self) -> i32 {
        60
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        if !ctx.fingerprint.bounding_box().is_visible() {
            return None;
        }
        let element = match self.hit_test(ctx).await {
            Some(element) => element,
            None => self.scan(ctx).await?,
        };
        Some(StrategyMatch {
            selector: selector_for(ctx, element).await?,
            element,
            confidence: CONFIDENCE,
        })
    }
}
