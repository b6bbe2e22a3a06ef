use async_trait::async_trait;

use super::{try_selector, HealContext, HealingStrategy, StrategyMatch};

/// Deepest ancestor context tried; keeps `0.6 + 0.1 × depth` at or below 1.0.
pub const MAX_HIERARCHY_DEPTH: usize = 4;

/// Rebuilds a descendant selector from the recorded ancestor path, deepest
/// context first.
#[derive(Debug, Clone)]
pub struct HierarchyStrategy {
    max_depth: usize,
}

impl Default for HierarchyStrategy {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

impl HierarchyStrategy {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.clamp(1, MAX_HIERARCHY_DEPTH),
        }
    }

    fn selectors(&self, ctx: &HealContext<'_>) -> Vec<(String, f64)> {
        let path = &ctx.fingerprint.ancestor_path;
        let tag = &ctx.fingerprint.tag_name;
        (1..=self.max_depth.min(path.len()))
            .rev()
            .map(|depth| {
                let context: Vec<&str> = path[path.len() - depth..]
                    .iter()
                    .map(|node| node.selector.as_str())
                    .collect();
                (
                    format!("{} {}", context.join(" "), tag),
                    (0.6 + 0.1 * depth as f64).min(1.0),
                )
            })
            .collect()
    }
}

#[async_trait]
impl HealingStrategy for HierarchyStrategy {
    fn name(&self) -> &'static str {
        "hierarchy"
    }

    fn default_priority(&self) -> i32 {
        75
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        for (selector, confidence) in self.selectors(ctx) {
            if let Some(found) = try_selector(ctx, self.name(), &selector, confidence).await {
                return Some(found);
            }
        }
        None
    }
}
