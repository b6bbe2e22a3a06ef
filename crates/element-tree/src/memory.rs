//! In-memory element tree.
//!
//! Backs the locator in tests and in the CLI, where page snapshots are loaded
//! from JSON. Mutations go through `&self` so a tree can be shared behind an
//! `Arc` while a scenario edits it between resolutions.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use locator_core_types::{BoundingBox, ElementHandle, Point};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ElementTree;
use crate::errors::TreeError;
use crate::selector::{
    self, normalize_text, Axis, Combinator, ComplexSelector, CompoundSelector, ParsedSelector,
    Predicate, PseudoClass, TextSource, XPathExpr, XPathStep,
};

/// Serializable element description used to build trees and snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryElement {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<BoundingBox>,
    #[serde(default)]
    pub children: Vec<MemoryElement>,
}

impl MemoryElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Appends a class token.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(&class);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(BoundingBox::new(x, y, width, height));
        self
    }

    pub fn child(mut self, child: MemoryElement) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    rect: Option<BoundingBox>,
    parent: Option<u64>,
    children: Vec<u64>,
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: HashMap<u64, Node>,
    root: u64,
    next_id: u64,
}

impl TreeState {
    fn node(&self, id: u64) -> Result<&Node, TreeError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| TreeError::Detached(ElementHandle(id).to_string()))
    }

    fn node_mut(&mut self, id: u64) -> Result<&mut Node, TreeError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| TreeError::Detached(ElementHandle(id).to_string()))
    }

    fn insert(&mut self, parent: Option<u64>, element: MemoryElement) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let MemoryElement {
            tag,
            attributes,
            text,
            rect,
            children,
        } = element;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                attributes,
                text,
                rect,
                parent,
                children: Vec::new(),
            },
        );
        let child_ids: Vec<u64> = children
            .into_iter()
            .map(|child| self.insert(Some(id), child))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = child_ids;
        }
        id
    }

    fn document_order(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn text_content(&self, id: u64) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: u64, out: &mut String) {
        if let Some(node) = self.nodes.get(&id) {
            if let Some(text) = &node.text {
                out.push_str(text);
            }
            for child in &node.children {
                self.collect_text(*child, out);
            }
        }
    }

    fn siblings(&self, id: u64) -> Vec<u64> {
        match self.nodes.get(&id).and_then(|node| node.parent) {
            Some(parent) => self
                .nodes
                .get(&parent)
                .map(|p| p.children.clone())
                .unwrap_or_default(),
            None => vec![id],
        }
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        node.attributes
            .get("class")
            .map_or(false, |value| value.split_whitespace().any(|c| c == class))
    }

    fn matches_compound(&self, id: u64, compound: &CompoundSelector) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if let Some(tag) = &compound.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if !compound
            .ids
            .iter()
            .all(|want| node.attributes.get("id") == Some(want))
        {
            return false;
        }
        if !compound.classes.iter().all(|c| self.has_class(node, c)) {
            return false;
        }
        if !compound
            .attributes
            .iter()
            .all(|attr| attr.matches(node.attributes.get(&attr.name).map(String::as_str)))
        {
            return false;
        }
        compound.pseudos.iter().all(|pseudo| self.matches_pseudo(id, node, pseudo))
    }

    fn matches_pseudo(&self, id: u64, node: &Node, pseudo: &PseudoClass) -> bool {
        let siblings = self.siblings(id);
        match pseudo {
            PseudoClass::NthChild(n) => siblings.iter().position(|s| *s == id) == Some(n - 1),
            PseudoClass::FirstChild => siblings.first() == Some(&id),
            PseudoClass::LastChild => siblings.last() == Some(&id),
            PseudoClass::NthOfType(n) => siblings
                .iter()
                .filter(|s| self.nodes.get(s).map_or(false, |sib| sib.tag == node.tag))
                .position(|s| *s == id)
                == Some(n - 1),
            PseudoClass::HasText(needle) => {
                let haystack = normalize_text(&self.text_content(id)).to_lowercase();
                haystack.contains(&normalize_text(needle).to_lowercase())
            }
        }
    }

    fn matches_complex(&self, id: u64, selector: &ComplexSelector) -> bool {
        match selector.parts.len() {
            0 => false,
            len => self.matches_from(id, &selector.parts, len - 1),
        }
    }

    fn matches_from(&self, id: u64, parts: &[(Combinator, CompoundSelector)], index: usize) -> bool {
        if !self.matches_compound(id, &parts[index].1) {
            return false;
        }
        if index == 0 {
            return true;
        }
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        match parts[index].0 {
            Combinator::Child => node
                .parent
                .map_or(false, |parent| self.matches_from(parent, parts, index - 1)),
            Combinator::Descendant => {
                let mut current = node.parent;
                while let Some(ancestor) = current {
                    if self.matches_from(ancestor, parts, index - 1) {
                        return true;
                    }
                    current = self.nodes.get(&ancestor).and_then(|n| n.parent);
                }
                false
            }
            Combinator::Adjacent => {
                let siblings = self.siblings(id);
                match siblings.iter().position(|s| *s == id) {
                    Some(pos) if pos > 0 => self.matches_from(siblings[pos - 1], parts, index - 1),
                    _ => false,
                }
            }
            Combinator::Sibling => {
                let siblings = self.siblings(id);
                let pos = siblings.iter().position(|s| *s == id).unwrap_or(0);
                siblings[..pos]
                    .iter()
                    .any(|s| self.matches_from(*s, parts, index - 1))
            }
        }
    }

    fn query_css(&self, selectors: &[ComplexSelector]) -> Vec<u64> {
        self.document_order()
            .into_iter()
            .filter(|id| selectors.iter().any(|sel| self.matches_complex(*id, sel)))
            .collect()
    }

    /// Children of a context node; `None` is the document.
    fn context_children(&self, context: Option<u64>) -> Vec<u64> {
        match context {
            None => vec![self.root],
            Some(id) => self
                .nodes
                .get(&id)
                .map(|node| node.children.clone())
                .unwrap_or_default(),
        }
    }

    fn descendants_or_self(&self, context: Option<u64>) -> Vec<Option<u64>> {
        let mut out = vec![context];
        let mut stack: Vec<u64> = self.context_children(context).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(Some(id));
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn query_xpath(&self, expr: &XPathExpr) -> Vec<u64> {
        let order: HashMap<u64, usize> = self
            .document_order()
            .into_iter()
            .enumerate()
            .map(|(pos, id)| (id, pos))
            .collect();
        let mut contexts: Vec<Option<u64>> = vec![None];
        for step in &expr.steps {
            let parents: Vec<Option<u64>> = match step.axis {
                Axis::Child => contexts.clone(),
                Axis::Descendant => contexts
                    .iter()
                    .flat_map(|ctx| self.descendants_or_self(*ctx))
                    .collect(),
            };
            let mut next: Vec<u64> = Vec::new();
            for parent in parents {
                next.extend(self.apply_step(self.context_children(parent), step));
            }
            next.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
            next.dedup();
            contexts = next.into_iter().map(Some).collect();
        }
        let results: Vec<u64> = contexts.into_iter().flatten().collect();
        match expr.group_index {
            Some(n) => results.get(n - 1).copied().into_iter().collect(),
            None => results,
        }
    }

    fn apply_step(&self, children: Vec<u64>, step: &XPathStep) -> Vec<u64> {
        let mut matched: Vec<u64> = children
            .into_iter()
            .filter(|id| match &step.name {
                Some(name) => self.nodes.get(id).map_or(false, |n| &n.tag == name),
                None => true,
            })
            .collect();
        for predicate in &step.predicates {
            matched = match predicate {
                Predicate::Index(n) => matched.get(n - 1).copied().into_iter().collect(),
                Predicate::Last => matched.last().copied().into_iter().collect(),
                other => matched
                    .into_iter()
                    .filter(|id| self.matches_predicate(*id, other))
                    .collect(),
            };
        }
        matched
    }

    fn matches_predicate(&self, id: u64, predicate: &Predicate) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        match predicate {
            Predicate::Index(_) | Predicate::Last => true,
            Predicate::HasAttribute(name) => node.attributes.contains_key(name),
            Predicate::AttributeEquals(name, value) => node.attributes.get(name) == Some(value),
            Predicate::AttributeContains(name, value) => node
                .attributes
                .get(name)
                .map_or(false, |actual| actual.contains(value.as_str())),
            Predicate::TextEquals(source, value) => &self.text_for(id, node, *source) == value,
            Predicate::TextContains(source, value) => {
                self.text_for(id, node, *source).contains(value.as_str())
            }
        }
    }

    fn text_for(&self, id: u64, node: &Node, source: TextSource) -> String {
        match source {
            TextSource::Direct => node.text.clone().unwrap_or_default(),
            TextSource::Normalized => normalize_text(&self.text_content(id)),
        }
    }

    fn remove_subtree(&mut self, id: u64) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }
}

/// Element tree held entirely in memory.
#[derive(Debug)]
pub struct MemoryTree {
    state: RwLock<TreeState>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Empty document: `html > body`.
    pub fn new() -> Self {
        Self::from_root(MemoryElement::new("html").child(MemoryElement::new("body")))
    }

    pub fn from_root(root: MemoryElement) -> Self {
        let mut state = TreeState::default();
        state.root = state.insert(None, root);
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn from_snapshot(snapshot: &serde_json::Value) -> Result<Self, TreeError> {
        let root = MemoryElement::deserialize(snapshot)
            .map_err(|e| TreeError::Backend(format!("invalid tree snapshot: {}", e)))?;
        Ok(Self::from_root(root))
    }

    /// Loads a snapshot produced by serializing a [`MemoryElement`].
    pub fn from_json_str(json: &str) -> Result<Self, TreeError> {
        let root: MemoryElement = serde_json::from_str(json)
            .map_err(|e| TreeError::Backend(format!("invalid tree snapshot: {}", e)))?;
        Ok(Self::from_root(root))
    }

    pub fn root(&self) -> ElementHandle {
        ElementHandle(self.state.read().root)
    }

    /// First `body` element, or the root when the document has none.
    pub fn body(&self) -> ElementHandle {
        let state = self.state.read();
        let body = state
            .document_order()
            .into_iter()
            .find(|id| state.nodes.get(id).map_or(false, |n| n.tag == "body"))
            .unwrap_or(state.root);
        ElementHandle(body)
    }

    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, element: ElementHandle) -> bool {
        self.state.read().nodes.contains_key(&element.0)
    }

    pub fn append(
        &self,
        parent: ElementHandle,
        element: MemoryElement,
    ) -> Result<ElementHandle, TreeError> {
        let index = self.state.read().node(parent.0)?.children.len();
        self.insert(parent, index, element)
    }

    /// Inserts `element` as child number `index` of `parent`, clamped to the end.
    pub fn insert(
        &self,
        parent: ElementHandle,
        index: usize,
        element: MemoryElement,
    ) -> Result<ElementHandle, TreeError> {
        let mut state = self.state.write();
        state.node(parent.0)?;
        let id = state.insert(Some(parent.0), element);
        let node = state.node_mut(parent.0)?;
        let index = index.min(node.children.len());
        node.children.insert(index, id);
        Ok(ElementHandle(id))
    }

    /// Removes the element and its subtree; their handles become detached.
    pub fn remove(&self, element: ElementHandle) -> Result<(), TreeError> {
        let mut state = self.state.write();
        let parent = state.node(element.0)?.parent;
        if let Some(parent) = parent {
            state.node_mut(parent)?.children.retain(|c| *c != element.0);
        }
        state.remove_subtree(element.0);
        Ok(())
    }

    pub fn set_attribute(
        &self,
        element: ElementHandle,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), TreeError> {
        let mut state = self.state.write();
        state
            .node_mut(element.0)?
            .attributes
            .insert(name.to_ascii_lowercase(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&self, element: ElementHandle, name: &str) -> Result<(), TreeError> {
        let mut state = self.state.write();
        state
            .node_mut(element.0)?
            .attributes
            .remove(&name.to_ascii_lowercase());
        Ok(())
    }

    pub fn set_text(
        &self,
        element: ElementHandle,
        text: impl Into<String>,
    ) -> Result<(), TreeError> {
        let mut state = self.state.write();
        state.node_mut(element.0)?.text = Some(text.into());
        Ok(())
    }

    pub fn set_rect(&self, element: ElementHandle, rect: BoundingBox) -> Result<(), TreeError> {
        let mut state = self.state.write();
        state.node_mut(element.0)?.rect = Some(rect);
        Ok(())
    }

    fn query(&self, selector: &str) -> Result<Vec<ElementHandle>, TreeError> {
        let parsed = selector::parse(selector)?;
        let state = self.state.read();
        let ids = match &parsed {
            ParsedSelector::Css(list) => state.query_css(list),
            ParsedSelector::XPath(expr) => state.query_xpath(expr),
        };
        Ok(ids.into_iter().map(ElementHandle).collect())
    }
}

#[async_trait]
impl ElementTree for MemoryTree {
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, TreeError> {
        let found = self.query(selector)?;
        debug!(selector, matches = found.len(), "memory tree query");
        Ok(found)
    }

    async fn tag_name(&self, element: ElementHandle) -> Result<String, TreeError> {
        Ok(self.state.read().node(element.0)?.tag.clone())
    }

    async fn attributes(
        &self,
        element: ElementHandle,
    ) -> Result<BTreeMap<String, String>, TreeError> {
        Ok(self.state.read().node(element.0)?.attributes.clone())
    }

    async fn text(&self, element: ElementHandle) -> Result<String, TreeError> {
        let state = self.state.read();
        state.node(element.0)?;
        Ok(state.text_content(element.0))
    }

    async fn bounding_box(&self, element: ElementHandle) -> Result<BoundingBox, TreeError> {
        Ok(self
            .state
            .read()
            .node(element.0)?
            .rect
            .unwrap_or_default())
    }

    async fn element_at_point(
        &self,
        x: f64,
        y: f64,
    ) -> Result<Option<ElementHandle>, TreeError> {
        let state = self.state.read();
        let point = Point::new(x, y);
        let hit = state.document_order().into_iter().rev().find(|id| {
            state
                .nodes
                .get(id)
                .and_then(|node| node.rect)
                .map_or(false, |rect| rect.is_visible() && rect.contains(point))
        });
        Ok(hit.map(ElementHandle))
    }

    async fn parent(&self, element: ElementHandle) -> Result<Option<ElementHandle>, TreeError> {
        Ok(self
            .state
            .read()
            .node(element.0)?
            .parent
            .map(ElementHandle))
    }

    async fn children(&self, element: ElementHandle) -> Result<Vec<ElementHandle>, TreeError> {
        Ok(self
            .state
            .read()
            .node(element.0)?
            .children
            .iter()
            .copied()
            .map(ElementHandle)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_tree() -> MemoryTree {
        MemoryTree::from_root(
            MemoryElement::new("html").child(
                MemoryElement::new("body").child(
                    MemoryElement::new("form")
                        .id("login")
                        .child(MemoryElement::new("input").attr("name", "user"))
                        .child(MemoryElement::new("input").attr("name", "pass"))
                        .child(
                            MemoryElement::new("button")
                                .class("btn")
                                .class("primary")
                                .text("Sign ")
                                .child(MemoryElement::new("span").text("In")),
                        ),
                ),
            ),
        )
    }

    #[tokio::test]
    async fn test_css_queries() {
        let tree = form_tree();
        assert_eq!(tree.find_all("input").await.unwrap().len(), 2);
        assert_eq!(tree.find_all("#login > input").await.unwrap().len(), 2);
        assert_eq!(tree.find_all("input:nth-of-type(2)").await.unwrap().len(), 1);
        assert_eq!(tree.find_all("button:has-text(\"sign in\")").await.unwrap().len(), 1);
        assert_eq!(tree.find_all("input + button").await.unwrap().len(), 1);
        assert_eq!(tree.find_all("input ~ button.primary").await.unwrap().len(), 1);
        assert!(tree.find_all("form > span").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_xpath_queries() {
        let tree = form_tree();
        let button = tree.find("button").await.unwrap().unwrap();
        assert_eq!(
            tree.find("/html/body/form/button[1]").await.unwrap(),
            Some(button)
        );
        assert_eq!(
            tree.find("//button[contains(normalize-space(.), 'Sign In')]")
                .await
                .unwrap(),
            Some(button)
        );
        let second = tree.find("(//input)[2]").await.unwrap().unwrap();
        assert_eq!(
            tree.attributes(second).await.unwrap().get("name").map(String::as_str),
            Some("pass")
        );
        assert!(tree.find_all("//input[3]").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removed_handles_are_detached() {
        let tree = form_tree();
        let button = tree.find("button").await.unwrap().unwrap();
        tree.remove(button).unwrap();
        assert!(matches!(
            tree.tag_name(button).await,
            Err(TreeError::Detached(_))
        ));
        assert!(tree.find_all("span").await.unwrap().is_empty());
    }
}
