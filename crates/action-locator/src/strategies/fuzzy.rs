use async_trait::async_trait;
use element_tree::selector::{self, AttrOp, AttributeSelector, CompoundSelector, ParsedSelector};

use super::{try_selector, HealContext, HealingStrategy, StrategyMatch};
use crate::escape::{css_escape, css_string};

const CONFIDENCE: f64 = 0.4;
const MIN_ID_TOKEN: usize = 3;

/// Retries subsets of the original selector's target compound.
#[derive(Debug, Default, Clone)]
pub struct FuzzyStrategy;

impl FuzzyStrategy {
    /// Target compound of a CSS selector; `None` for XPath or bad input.
    fn target_compound(original: &str) -> Option<CompoundSelector> {
        match selector::parse(original).ok()? {
            ParsedSelector::Css(list) => list.into_iter().next()?.parts.pop().map(|(_, c)| c),
            ParsedSelector::XPath(_) => None,
        }
    }

    fn variants(original: &str, fallback_tag: &str) -> Vec<String> {
        let Some(compound) = Self::target_compound(original) else {
            return Vec::new();
        };
        let tag = compound
            .tag
            .clone()
            .unwrap_or_else(|| fallback_tag.to_string());
        let classes: Vec<String> = compound
            .classes
            .iter()
            .map(|c| format!(".{}", css_escape(c)))
            .collect();
        let attributes: Vec<String> = compound.attributes.iter().map(render_attribute).collect();

        let mut variants = Vec::new();
        for id in &compound.ids {
            for token in id
                .split(|c: char| c == '-' || c == '_')
                .filter(|t| t.chars().count() >= MIN_ID_TOKEN)
            {
                variants.push(format!("{}[id*={}]", tag, css_string(token)));
            }
        }
        if !attributes.is_empty() {
            variants.push(format!("{}{}", tag, attributes.concat()));
        }
        variants.extend(classes.iter().map(|c| format!("{}{}", tag, c)));
        variants.extend(attributes.iter().map(|a| format!("{}{}", tag, a)));
        variants.extend(classes.iter().cloned());
        variants.extend(attributes.iter().cloned());
        variants.push(tag);

        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| v != original && seen.insert(v.clone()));
        variants
    }
}

fn render_attribute(attr: &AttributeSelector) -> String {
    let op = match attr.op {
        AttrOp::Exists => return format!("[{}]", css_escape(&attr.name)),
        AttrOp::Equals => "=",
        AttrOp::Includes => "~=",
        AttrOp::DashMatch => "|=",
        AttrOp::Prefix => "^=",
        AttrOp::Suffix => "$=",
        AttrOp::Substring => "*=",
    };
    format!(
        "[{}{}{}{}]",
        css_escape(&attr.name),
        op,
        css_string(&attr.value),
        if attr.case_insensitive { " i" } else { "" }
    )
}

#[async_trait]
impl HealingStrategy for FuzzyStrategy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn default_priority(&self) -> i32 {
        50
    }

    async fn attempt(&self, ctx: &HealContext<'_>) -> Option<StrategyMatch> {
        for selector in Self::variants(ctx.original_selector, &ctx.fingerprint.tag_name) {
            if let Some(found) = try_selector(ctx, self.name(), &selector, CONFIDENCE).await {
                return Some(found);
            }
        }
        None
    }
}
