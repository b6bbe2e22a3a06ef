//! Selector grammar understood by the in-memory tree.
//!
//! Two dialects share one entry point:
//! - CSS subset (`button.primary > span:has-text("Save")`)
//! - XPath subset, recognised by a leading `/` or `(`

pub mod css;
pub mod xpath;

pub use css::{
    AttrOp, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, PseudoClass,
};
pub use xpath::{Axis, Predicate, TextSource, XPathExpr, XPathStep};

use crate::errors::TreeError;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSelector {
    Css(Vec<ComplexSelector>),
    XPath(XPathExpr),
}

pub fn parse(selector: &str) -> Result<ParsedSelector, TreeError> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(TreeError::invalid(selector, "empty selector"));
    }
    if is_xpath(trimmed) {
        xpath::parse(trimmed).map(ParsedSelector::XPath)
    } else {
        css::parse(trimmed).map(ParsedSelector::Css)
    }
}

pub fn is_xpath(selector: &str) -> bool {
    let trimmed = selector.trim_start();
    trimmed.starts_with('/') || trimmed.starts_with('(')
}

/// Collapse runs of whitespace and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
