use async_trait::async_trait;
use element_tree::normalize_text;

use super::{try_selector, HealContext, HealingStrategy, StrategyMatch};
use crate::escape::{css_string, xpath_literal};

const CONFIDENCE: f64 = 0.7;
const MIN_TOKEN_CHARS: usize = 3;

/// Re-locates by visible text.
#[derive(Debug, Default, Clone)]
pub struct TextStrategy;

impl TextStrategy {
    fn selectors(tag: &str, text: &str) -> Vec<String> {
        let mut selectors = vec![format!("{}:has-text({})", tag, css_string(text))];

        let tokens: Vec<&str> = text
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .collect();
        if tokens.len() > 1 || tokens.first().map_or(false, |t| *t != text) {
            let chained: String = tokens
                .iter()
                .map(|t| format!(":has-text({})", css_string(t)))
                .collect();
            selectors.push(format!("{}{}", tag, chained));
        }

        selectors.push(format!(
            "//{}[contains(normalize-space(.), {})]",
            tag,
            xpath_literal(text)
        ));
        selectors
    }
}

#[async_trait]
impl HealingStrategy for TextStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn default_priority(&self) -> i32 {
        90
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        let text = normalize_text(ctx.fingerprint.text()?);
        if text.is_empty() {
            return None;
        }
        for selector in Self::selectors(&ctx.fingerprint.tag_name, &text) {
            if let Some(found) = try_selector(ctx, self.name(), &selector, CONFIDENCE).await {
                return Some(found);
            }
        }
        None
    }
}
