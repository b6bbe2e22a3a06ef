use async_trait::async_trait;

use super::{try_selector, HealContext, HealingStrategy, StrategyMatch};
use crate::escape::{attribute_selector, css_escape};

/// Re-locates by recorded attributes: id, data-testid, name, each class
/// token, aria-label.
#[derive(Debug, Default, Clone)]
pub struct AttributeStrategy;

impl AttributeStrategy {
    fn selectors(ctx: &HealContext<'_>) -> Vec<(String, f64)> {
        let fp = ctx.fingerprint;
        let tag = fp.tag_name.as_str();
        let mut out = Vec::new();
        if let Some(id) = fp.attribute("id") {
            out.push((format!("{}#{}", tag, css_escape(id)), 0.9));
        }
        if let Some(test_id) = fp.attribute("data-testid") {
            out.push((attribute_selector(Some(tag), "data-testid", test_id), 0.7));
        }
        if let Some(name) = fp.attribute("name") {
            out.push((attribute_selector(Some(tag), "name", name), 0.7));
        }
        if let Some(classes) = fp.attribute("class") {
            for class in classes.split_whitespace() {
                out.push((format!("{}.{}", tag, css_escape(class)), 0.6));
            }
        }
        if let Some(label) = fp.attribute("aria-label") {
            out.push((attribute_selector(Some(tag), "aria-label", label), 0.65));
        }
        out
    }
}

#[async_trait]
impl HealingStrategy for AttributeStrategy {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn default_priority(&self) -> i32 {
        85
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        for (selector, confidence) in Self::selectors(ctx) {
            if let Some(found) = try_selector(ctx, self.name(), &selector, confidence).await {
                return Some(found);
            }
        }
        None
    }
}
