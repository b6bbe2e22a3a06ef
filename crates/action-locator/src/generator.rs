//! Candidate selector generation and selection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use element_tree::{normalize_text, ElementTree, TreeError};
use locator_core_types::ElementHandle;
use tracing::{debug, info, warn};

use crate::config::SelectorOptions;
use crate::errors::LocatorError;
use crate::escape::{attribute_selector, css_escape, css_string};
use crate::fingerprint::{index_of_type, FingerprintBuilder};
use crate::heuristics::{looks_generated_id, stable_classes};
use crate::scoring::score_candidate;
use crate::types::{ElementLocator, SelectorCandidate, SelectorType};

const MAX_CLASS_PATH_ANCESTORS: usize = 4;
const MAX_SEGMENT_CLASSES: usize = 3;
const MAX_TEXT_CHARS: usize = 50;
const MIN_TEXT_CHARS: usize = 3;

struct RawCandidate {
    selector_type: SelectorType,
    selector: String,
    stable: bool,
    description: String,
}

impl RawCandidate {
    fn new(
        selector_type: SelectorType,
        selector: String,
        stable: bool,
        description: impl Into<String>,
    ) -> Self {
        Self {
            selector_type,
            selector,
            stable,
            description: description.into(),
        }
    }
}

/// Produces scored selector candidates for elements of a live tree.
#[derive(Debug, Clone, Default)]
pub struct CandidateGenerator {
    options: SelectorOptions,
    fingerprints: FingerprintBuilder,
}

impl CandidateGenerator {
    pub fn new(options: SelectorOptions) -> Self {
        Self {
            options,
            fingerprints: FingerprintBuilder::default(),
        }
    }

    pub fn options(&self) -> &SelectorOptions {
        &self.options
    }

    /// All candidates the configured generators produce, scored against the
    /// current tree.
    pub async fn candidates(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
    ) -> Result<Vec<SelectorCandidate>, LocatorError> {
        self.collect(tree, element, &self.options).await
    }

    /// Best candidate after the unique/stable filter and priority ordering.
    pub async fn generate_selector(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
    ) -> Result<SelectorCandidate, LocatorError> {
        let options = &self.options;
        let candidates = self.candidates(tree, element).await?;
        if candidates.is_empty() {
            warn!("No selector candidates for {}", element);
            return Err(LocatorError::NoSelectorGenerated(format!(
                "no candidates for {}",
                element
            )));
        }

        let mut pool: Vec<SelectorCandidate> = candidates
            .iter()
            .filter(|c| (!options.unique || c.unique) && (!options.stable || c.stable))
            .cloned()
            .collect();

        if pool.is_empty() {
            if !options.fallback {
                return Err(LocatorError::NoSelectorGenerated(format!(
                    "no candidate for {} satisfies unique={} stable={}",
                    element, options.unique, options.stable
                )));
            }
            debug!("Filter left no candidates for {}; relaxing to top 3", element);
            pool = candidates;
            pool.sort_by(by_score_desc);
            pool.truncate(3);
        }

        pool.sort_by(|a, b| {
            options
                .priority_rank(a.selector_type)
                .cmp(&options.priority_rank(b.selector_type))
                .then_with(|| by_score_desc(a, b))
        });

        let chosen = pool.into_iter().next().ok_or_else(|| {
            LocatorError::NoSelectorGenerated(format!("no candidates for {}", element))
        })?;
        debug!(
            "Selected {} selector '{}' (score: {:.2}, unique: {})",
            chosen.selector_type, chosen.selector, chosen.score, chosen.unique
        );
        Ok(chosen)
    }

    /// Up to `max` alternates from relaxed generation, one per type first.
    pub async fn generate_alternative_selectors(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
        max: usize,
    ) -> Result<Vec<SelectorCandidate>, LocatorError> {
        let relaxed = self.options.relaxed();
        let mut all = self.collect(tree, element, &relaxed).await?;
        all.sort_by(by_score_desc);

        let mut picked: Vec<SelectorCandidate> = Vec::with_capacity(max);
        let mut types = HashSet::new();
        for candidate in &all {
            if picked.len() >= max {
                break;
            }
            if types.insert(candidate.selector_type) {
                picked.push(candidate.clone());
            }
        }
        for candidate in &all {
            if picked.len() >= max {
                break;
            }
            if !picked.iter().any(|p| p.selector == candidate.selector) {
                picked.push(candidate.clone());
            }
        }
        Ok(picked)
    }

    /// Primary selector, alternates and fingerprint for a captured element.
    pub async fn build_locator(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
    ) -> Result<ElementLocator, LocatorError> {
        let primary = self.generate_selector(tree, element).await?;
        let max = self.options.max_alternatives;
        let alternatives: Vec<String> = self
            .generate_alternative_selectors(tree, element, max + 1)
            .await?
            .into_iter()
            .map(|c| c.selector)
            .filter(|s| s != &primary.selector)
            .take(max)
            .collect();
        let fingerprint = self.fingerprints.capture(tree, element).await?;
        info!(
            "Built locator '{}' with {} alternatives",
            primary.selector,
            alternatives.len()
        );
        Ok(ElementLocator::new(primary.selector, alternatives, fingerprint))
    }

    /// `/html/body[1]/div[2]/button[1]` style path from the root.
    pub async fn absolute_xpath(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
    ) -> Result<String, TreeError> {
        let mut steps = Vec::new();
        let mut current = Some(element);
        while let Some(node) = current {
            let tag = tree.tag_name(node).await?;
            let parent = tree.parent(node).await?;
            if parent.is_some() {
                let index = index_of_type(tree, node, &tag).await?;
                steps.push(format!("{}[{}]", tag, index));
            } else {
                steps.push(tag);
            }
            current = parent;
        }
        steps.reverse();
        Ok(format!("/{}", steps.join("/")))
    }

    async fn collect(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
        options: &SelectorOptions,
    ) -> Result<Vec<SelectorCandidate>, LocatorError> {
        let tag = tree
            .tag_name(element)
            .await
            .map_err(LocatorError::from_element_query)?;
        let attributes = tree.attributes(element).await?;
        let raw = self
            .raw_candidates(tree, element, &tag, &attributes, options)
            .await?;

        let mut seen = HashSet::new();
        let mut scored = Vec::with_capacity(raw.len());
        for candidate in raw {
            if !seen.insert(candidate.selector.clone()) {
                continue;
            }
            let matches = match tree.find_all(&candidate.selector).await {
                Ok(matches) => matches,
                Err(err) => {
                    debug!("Skipping candidate '{}': {}", candidate.selector, err);
                    continue;
                }
            };
            if !matches.is_empty() && !matches.contains(&element) {
                debug!(
                    "Skipping candidate '{}': matches other elements only",
                    candidate.selector
                );
                continue;
            }
            let count = matches.len();
            scored.push(SelectorCandidate {
                score: score_candidate(candidate.selector_type, &candidate.selector, count),
                unique: count == 1,
                stable: candidate.stable,
                description: candidate.description,
                match_count: count,
                selector_type: candidate.selector_type,
                selector: candidate.selector,
            });
        }
        Ok(scored)
    }

    async fn raw_candidates(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
        tag: &str,
        attributes: &BTreeMap<String, String>,
        options: &SelectorOptions,
    ) -> Result<Vec<RawCandidate>, TreeError> {
        let usable = |name: &str| {
            if options.is_ignored(name) {
                return None;
            }
            attributes
                .get(&name.to_ascii_lowercase())
                .filter(|v| !v.trim().is_empty())
        };
        let mut raw = Vec::new();

        if options.include_id {
            if let Some(id) = usable("id") {
                raw.push(RawCandidate::new(
                    SelectorType::Id,
                    format!("#{}", css_escape(id)),
                    !looks_generated_id(id),
                    "id attribute",
                ));
            }
        }

        let mut seen_types = HashSet::new();
        for name in &options.custom_attributes {
            let selector_type = if name.eq_ignore_ascii_case("data-testid") {
                SelectorType::DataTestid
            } else {
                SelectorType::DataTest
            };
            if seen_types.contains(&selector_type) {
                continue;
            }
            if let Some(value) = usable(name.as_str()) {
                seen_types.insert(selector_type);
                raw.push(RawCandidate::new(
                    selector_type,
                    attribute_selector(None, &name.to_ascii_lowercase(), value),
                    true,
                    format!("{} attribute", name),
                ));
            }
        }

        if options.aria_label_fallback {
            if let Some(label) = usable("aria-label") {
                raw.push(RawCandidate::new(
                    SelectorType::AriaLabel,
                    attribute_selector(None, "aria-label", label),
                    true,
                    "accessible label",
                ));
            }
        }

        if options.include_attributes {
            if let Some(name) = usable("name") {
                raw.push(RawCandidate::new(
                    SelectorType::Name,
                    attribute_selector(Some(tag), "name", name),
                    true,
                    "name attribute",
                ));
            }
            if let Some(placeholder) = usable("placeholder") {
                raw.push(RawCandidate::new(
                    SelectorType::Placeholder,
                    attribute_selector(Some(tag), "placeholder", placeholder),
                    false,
                    "placeholder attribute",
                ));
            }
        }

        if options.include_text {
            let text = normalize_text(&tree.text(element).await?);
            if text.chars().count() >= MIN_TEXT_CHARS {
                let snippet: String = text.chars().take(MAX_TEXT_CHARS).collect();
                raw.push(RawCandidate::new(
                    SelectorType::Text,
                    format!("{}:has-text({})", tag, css_string(snippet.trim_end())),
                    false,
                    "visible text",
                ));
            }
        }

        if options.include_class {
            let (path, anchored) = self
                .class_path(tree, element, tag, attributes, options.optimize)
                .await?;
            raw.push(RawCandidate::new(SelectorType::Css, path, anchored, "class path"));
            raw.push(RawCandidate::new(
                SelectorType::Xpath,
                self.absolute_xpath(tree, element).await?,
                false,
                "absolute path",
            ));
        }

        if options.include_position {
            if let Some(selector) = position_selector(tree, element, tag).await? {
                raw.push(RawCandidate::new(
                    SelectorType::Position,
                    selector,
                    false,
                    "ordinal position",
                ));
            }
        }

        Ok(raw)
    }

    /// Child-combinator path of stable classes, anchored at the nearest
    /// ancestor id. Returns the path and whether it is id-anchored.
    async fn class_path(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
        tag: &str,
        attributes: &BTreeMap<String, String>,
        optimize: bool,
    ) -> Result<(String, bool), TreeError> {
        let mut segments = vec![class_segment(tag, attributes)];
        let mut anchored = false;
        let mut current = tree.parent(element).await?;
        while let Some(ancestor) = current {
            if segments.len() > MAX_CLASS_PATH_ANCESTORS {
                break;
            }
            let ancestor_tag = tree.tag_name(ancestor).await?;
            if ancestor_tag == "html" {
                break;
            }
            let ancestor_attrs = tree.attributes(ancestor).await?;
            if let Some(id) = stable_id(&ancestor_attrs) {
                segments.push(format!("#{}", css_escape(id)));
                anchored = true;
                break;
            }
            segments.push(class_segment(&ancestor_tag, &ancestor_attrs));
            current = tree.parent(ancestor).await?;
        }
        segments.reverse();

        if optimize {
            while segments.len() > 1 {
                let shorter = segments[1..].join(" > ");
                match tree.find_all(&shorter).await {
                    Ok(matches) if matches == [element] => {
                        if segments[0].starts_with('#') {
                            anchored = false;
                        }
                        segments.remove(0);
                    }
                    _ => break,
                }
            }
        }
        Ok((segments.join(" > "), anchored))
    }
}

fn by_score_desc(a: &SelectorCandidate, b: &SelectorCandidate) -> Ordering {
    b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
}

fn stable_id(attributes: &BTreeMap<String, String>) -> Option<&str> {
    attributes
        .get("id")
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && !looks_generated_id(id))
}

fn class_segment(tag: &str, attributes: &BTreeMap<String, String>) -> String {
    let classes: String = attributes
        .get("class")
        .map(|c| stable_classes(c))
        .unwrap_or_default()
        .iter()
        .take(MAX_SEGMENT_CLASSES)
        .map(|c| format!(".{}", css_escape(c)))
        .collect();
    format!("{}{}", tag, classes)
}

async fn position_selector(
    tree: &dyn ElementTree,
    element: ElementHandle,
    tag: &str,
) -> Result<Option<String>, TreeError> {
    let Some(parent) = tree.parent(element).await? else {
        return Ok(None);
    };
    let index = index_of_type(tree, element, tag).await?;
    let parent_attrs = tree.attributes(parent).await?;
    let prefix = match stable_id(&parent_attrs) {
        Some(id) => format!("#{}", css_escape(id)),
        None => tree.tag_name(parent).await?,
    };
    Ok(Some(format!("{} > {}:nth-of-type({})", prefix, tag, index)))
}
