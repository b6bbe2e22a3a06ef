//! Capture-time element fingerprints.

use element_tree::{normalize_text, ElementTree, TreeError};
use locator_core_types::{ElementHandle, Point, Size};
use tracing::debug;

use crate::errors::LocatorError;
use crate::escape::{attribute_selector, css_escape};
use crate::heuristics::{is_test_attribute, looks_generated_id, stable_classes};
use crate::types::{ElementFingerprint, PathNode};

/// Builds [`ElementFingerprint`]s from a live tree.
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    max_ancestors: usize,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self { max_ancestors: 5 }
    }
}

impl FingerprintBuilder {
    pub fn new(max_ancestors: usize) -> Self {
        Self { max_ancestors }
    }

    pub async fn capture(
        &self,
        tree: &dyn ElementTree,
        element: ElementHandle,
    ) -> Result<ElementFingerprint, LocatorError> {
        let tag_name = tree
            .tag_name(element)
            .await
            .map_err(LocatorError::from_element_query)?;
        let attributes = tree.attributes(element).await?;
        let text = normalize_text(&tree.text(element).await?);
        let rect = tree.bounding_box(element).await?;

        let mut ancestors = ancestors(tree, element).await?;
        ancestors.reverse();
        let mut ancestor_path = Vec::with_capacity(ancestors.len());
        for ancestor in ancestors {
            let tag = tree.tag_name(ancestor).await?;
            if tag == "html" {
                continue;
            }
            ancestor_path.push(path_node(tree, ancestor, tag).await?);
        }
        if ancestor_path.len() > self.max_ancestors {
            ancestor_path.drain(..ancestor_path.len() - self.max_ancestors);
        }

        debug!(
            "Captured fingerprint for <{}> with {} ancestors",
            tag_name,
            ancestor_path.len()
        );

        Ok(ElementFingerprint {
            tag_name,
            attributes,
            text_content: (!text.is_empty()).then_some(text),
            position: Point::new(rect.x, rect.y),
            size: Size::new(rect.width, rect.height),
            ancestor_path,
        })
    }
}

async fn path_node(
    tree: &dyn ElementTree,
    element: ElementHandle,
    tag_name: String,
) -> Result<PathNode, TreeError> {
    let attributes = tree.attributes(element).await?;
    let id = attributes.get("id").filter(|v| !v.trim().is_empty()).cloned();
    let class_name = attributes
        .get("class")
        .filter(|v| !v.trim().is_empty())
        .cloned();
    let sibling_index = sibling_index(tree, element).await?;

    let selector = if let Some(id) = id.as_deref().filter(|id| !looks_generated_id(id)) {
        format!("#{}", css_escape(id))
    } else if let Some(classes) = class_name
        .as_deref()
        .map(stable_classes)
        .filter(|c| !c.is_empty())
    {
        let classes: String = classes.iter().map(|c| format!(".{}", css_escape(c))).collect();
        format!("{}{}", tag_name, classes)
    } else if let Some((name, value)) = distinguishing_data_attribute(&attributes) {
        attribute_selector(Some(&tag_name), name, value)
    } else {
        tag_name.clone()
    };

    Ok(PathNode {
        tag_name,
        id,
        class_name,
        attributes,
        sibling_index,
        selector,
    })
}

/// Test attributes first, then any other non-empty `data-*`.
fn distinguishing_data_attribute(
    attributes: &std::collections::BTreeMap<String, String>,
) -> Option<(&str, &str)> {
    attributes
        .iter()
        .filter(|(k, _)| is_test_attribute(k))
        .find_map(non_empty_pair)
        .or_else(|| {
            attributes
                .iter()
                .filter(|(k, _)| k.starts_with("data-"))
                .find_map(non_empty_pair)
        })
}

fn non_empty_pair<'a>((k, v): (&'a String, &'a String)) -> Option<(&'a str, &'a str)> {
    (!v.trim().is_empty()).then_some((k.as_str(), v.as_str()))
}

/// Ancestors of `element`, parent first.
pub(crate) async fn ancestors(
    tree: &dyn ElementTree,
    element: ElementHandle,
) -> Result<Vec<ElementHandle>, TreeError> {
    let mut out = Vec::new();
    let mut current = tree.parent(element).await?;
    while let Some(parent) = current {
        out.push(parent);
        current = tree.parent(parent).await?;
    }
    Ok(out)
}

/// Zero-based index among the parent's element children.
pub(crate) async fn sibling_index(
    tree: &dyn ElementTree,
    element: ElementHandle,
) -> Result<usize, TreeError> {
    match tree.parent(element).await? {
        Some(parent) => Ok(tree
            .children(parent)
            .await?
            .iter()
            .position(|c| *c == element)
            .unwrap_or(0)),
        None => Ok(0),
    }
}

/// One-based index among same-tag siblings.
pub(crate) async fn index_of_type(
    tree: &dyn ElementTree,
    element: ElementHandle,
    tag: &str,
) -> Result<usize, TreeError> {
    let Some(parent) = tree.parent(element).await? else {
        return Ok(1);
    };
    let mut index = 0;
    for child in tree.children(parent).await? {
        if tree.tag_name(child).await? == tag {
            index += 1;
        }
        if child == element {
            return Ok(index.max(1));
        }
    }
    Ok(1)
}
