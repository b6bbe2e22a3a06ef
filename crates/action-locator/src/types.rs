//! Core types for the locator

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use locator_core_types::{BoundingBox, ElementHandle, Point, Size};
use serde::{Deserialize, Serialize};

use crate::config::ResolverSettings;

/// Selector family a candidate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorType {
    Id,
    DataTestid,
    DataTest,
    AriaLabel,
    Name,
    Placeholder,
    Text,
    Css,
    Xpath,
    Position,
}

impl SelectorType {
    /// All types, strongest first.
    pub const ALL: [SelectorType; 10] = [
        SelectorType::Id,
        SelectorType::DataTestid,
        SelectorType::DataTest,
        SelectorType::AriaLabel,
        SelectorType::Name,
        SelectorType::Placeholder,
        SelectorType::Text,
        SelectorType::Css,
        SelectorType::Xpath,
        SelectorType::Position,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SelectorType::Id => "id",
            SelectorType::DataTestid => "data-testid",
            SelectorType::DataTest => "data-test",
            SelectorType::AriaLabel => "aria-label",
            SelectorType::Name => "name",
            SelectorType::Placeholder => "placeholder",
            SelectorType::Text => "text",
            SelectorType::Css => "css",
            SelectorType::Xpath => "xpath",
            SelectorType::Position => "position",
        }
    }

    /// Base score of the type.
    pub fn weight(&self) -> f64 {
        match self {
            SelectorType::Id => 10.0,
            SelectorType::DataTestid => 9.0,
            SelectorType::DataTest => 8.0,
            SelectorType::AriaLabel => 7.0,
            SelectorType::Name => 6.0,
            SelectorType::Placeholder => 5.0,
            SelectorType::Text => 4.0,
            SelectorType::Css => 3.0,
            SelectorType::Xpath => 2.0,
            SelectorType::Position => 1.0,
        }
    }

    /// Types that earn the stability bonus.
    pub fn is_anchor(&self) -> bool {
        matches!(
            self,
            SelectorType::Id | SelectorType::DataTestid | SelectorType::DataTest
        )
    }
}

impl fmt::Display for SelectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        SelectorType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == needle)
            .ok_or_else(|| format!("unknown selector type '{}'", s))
    }
}

/// One proposed selector for an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub selector: String,
    #[serde(rename = "type")]
    pub selector_type: SelectorType,
    pub score: f64,
    pub unique: bool,
    pub stable: bool,
    pub description: String,
    /// Matches in the tree when the candidate was scored
    pub match_count: usize,
}

/// One ancestor recorded in a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Zero-based position among the parent's element children
    pub sibling_index: usize,
    /// Best single-node selector for this ancestor
    pub selector: String,
}

/// Snapshot of an element taken at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementFingerprint {
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    pub position: Point,
    pub size: Size,
    /// Outermost ancestor first, parent last
    #[serde(default)]
    pub ancestor_path: Vec<PathNode>,
}

impl ElementFingerprint {
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        )
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn text(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Capture-time locator for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementLocator {
    pub primary_selector: String,
    #[serde(default)]
    pub alternative_selectors: Vec<String>,
    pub fingerprint: ElementFingerprint,
}

impl ElementLocator {
    pub fn new(
        primary_selector: impl Into<String>,
        alternative_selectors: Vec<String>,
        fingerprint: ElementFingerprint,
    ) -> Self {
        Self {
            primary_selector: primary_selector.into(),
            alternative_selectors,
            fingerprint,
        }
    }

    /// Commits a healed selector as the new primary.
    ///
    /// The previous primary becomes the first alternate; the list stays within
    /// `max_alternatives`. Returns `false` when `healed` already is the primary.
    pub fn apply_heal(&mut self, healed: &str, max_alternatives: usize) -> bool {
        if healed == self.primary_selector {
            return false;
        }
        let previous = std::mem::replace(&mut self.primary_selector, healed.to_string());
        self.alternative_selectors
            .retain(|alt| alt != healed && alt != &previous);
        self.alternative_selectors.insert(0, previous);
        self.alternative_selectors.truncate(max_alternatives);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionMetadata {
    pub attempts: u32,
    pub healing_applied: bool,
    pub fallback_used: bool,
    pub time_taken_ms: u64,
    /// Served from the resolution cache
    #[serde(default)]
    pub from_cache: bool,
}

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub id: String,
    pub selector: String,
    pub element: Option<ElementHandle>,
    pub confidence: f64,
    pub strategy: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub metadata: ResolutionMetadata,
}

impl ResolutionResult {
    pub const STRATEGY_ORIGINAL: &'static str = "original";
    pub const STRATEGY_ALTERNATIVE: &'static str = "alternative";
    pub const STRATEGY_FAILED: &'static str = "failed";

    pub fn is_resolved(&self) -> bool {
        self.element.is_some()
    }
}

/// Per-call resolution options; part of the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    #[serde(default)]
    pub alternative_selectors: Vec<String>,
    pub original_timeout_ms: u64,
    pub alternative_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub retry_backoff_ms: u64,
    pub max_retries: u32,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_settings(&ResolverSettings::default())
    }
}

impl ResolveOptions {
    pub fn from_settings(settings: &ResolverSettings) -> Self {
        Self {
            alternative_selectors: Vec::new(),
            original_timeout_ms: settings.original_timeout_ms,
            alternative_timeout_ms: settings.alternative_timeout_ms,
            poll_interval_ms: settings.poll_interval_ms,
            retry_backoff_ms: settings.retry_backoff_ms,
            max_retries: settings.max_retries,
        }
    }

    pub fn with_alternatives(mut self, alternatives: Vec<String>) -> Self {
        self.alternative_selectors = alternatives;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn original_timeout(&self) -> Duration {
        Duration::from_millis(self.original_timeout_ms)
    }

    pub fn alternative_timeout(&self) -> Duration {
        Duration::from_millis(self.alternative_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Sleep after the zero-based `retry` round.
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(retry) + 1))
    }

    /// Stable hash of the options, used in the cache key.
    pub fn cache_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match serde_json::to_string(self) {
            Ok(encoded) => encoded.hash(&mut hasher),
            Err(_) => self.alternative_selectors.hash(&mut hasher),
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint() -> ElementFingerprint {
        ElementFingerprint {
            tag_name: "button".into(),
            attributes: BTreeMap::new(),
            text_content: Some("Save".into()),
            position: Point::new(0.0, 0.0),
            size: Size::new(10.0, 10.0),
            ancestor_path: Vec::new(),
        }
    }

    #[test]
    fn test_selector_type_names_round_trip() {
        for t in SelectorType::ALL {
            assert_eq!(t.name().parse::<SelectorType>().unwrap(), t);
        }
        let json = serde_json::to_string(&SelectorType::DataTestid).unwrap();
        assert_eq!(json, "\"data-testid\"");
        assert!("bogus".parse::<SelectorType>().is_err());
    }

    #[test]
    fn test_apply_heal_keeps_cap() {
        let mut locator = ElementLocator::new(
            "#old",
            vec!["a".into(), "b".into(), "c".into()],
            fingerprint(),
        );
        assert!(locator.apply_heal("b", 3));
        assert_eq!(locator.primary_selector, "b");
        assert_eq!(locator.alternative_selectors, vec!["#old", "a", "c"]);

        assert!(!locator.apply_heal("b", 3));
        assert!(locator.apply_heal("z", 2));
        assert_eq!(locator.alternative_selectors, vec!["b", "#old"]);
    }

    #[test]
    fn test_cache_hash_tracks_options() {
        let base = ResolveOptions::default();
        let same = ResolveOptions::default();
        let other = ResolveOptions::default().with_alternatives(vec!["#x".into()]);
        assert_eq!(base.cache_hash(), same.cache_hash());
        assert_ne!(base.cache_hash(), other.cache_hash());
        assert_eq!(base.backoff(0), Duration::from_millis(1000));
        assert_eq!(base.backoff(2), Duration::from_millis(3000));
    }
}
