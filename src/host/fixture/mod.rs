//! In-memory host document
//!
//! `FixturePage` implements [`HostPage`] over a tree of [`FixtureNode`]s,
//! loadable from JSON. It stands in for the live document in tests and in
//! the inspection CLI. Clicking an element that carries an `href` attribute
//! navigates to it, which is enough to model the host's filter chips and
//! reset control.

mod selector;

pub use selector::{Selector, SelectorError, SelectorTarget};

use super::{ElementId, HostPage, Location, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Serializable description of one element and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FixtureNode>,
}

impl FixtureNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_child(mut self, child: FixtureNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = FixtureNode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A fixture document: the tree plus the location and viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDocument {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_viewport")]
    pub viewport: Rect,
    pub root: FixtureNode,
}

fn default_url() -> String {
    "/home/workflows".to_string()
}

fn default_viewport() -> Rect {
    Rect::new(0.0, 0.0, 1280.0, 800.0)
}

/// Everything the fixture did when asked to act, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureAction {
    Click(ElementId),
    SetValue(ElementId, String),
    Submit(ElementId),
    Navigate(String),
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<Slot>,
    location: Location,
    viewport: Rect,
    actions: Vec<FixtureAction>,
    /// Bumped on every document replacement so stale handles never alias
    generation: u64,
}

#[derive(Debug)]
struct Slot {
    node: FixtureNode,
    parent: Option<usize>,
    children: Vec<usize>,
    value: String,
}

impl Arena {
    fn build(root: FixtureNode, location: Location, viewport: Rect, generation: u64) -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            location,
            viewport,
            actions: Vec::new(),
            generation,
        };
        arena.insert(root, None);
        arena
    }

    fn insert(&mut self, mut node: FixtureNode, parent: Option<usize>) -> usize {
        let children = std::mem::take(&mut node.children);
        let index = self.nodes.len();
        self.nodes.push(Slot {
            node,
            parent,
            children: Vec::new(),
            value: String::new(),
        });
        for child in children {
            let child_index = self.insert(child, Some(index));
            self.nodes[index].children.push(child_index);
        }
        index
    }

    fn handle(&self, index: usize) -> ElementId {
        ElementId((self.generation << 32) | index as u64)
    }

    fn index(&self, id: ElementId) -> Option<usize> {
        let index = (id.0 & 0xffff_ffff) as usize;
        (id.0 >> 32 == self.generation && index < self.nodes.len()).then_some(index)
    }

    fn descendants(&self, index: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[index].children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn text(&self, index: usize) -> String {
        let mut text = self.nodes[index].node.text.clone();
        for &child in &self.nodes[index].children {
            text.push_str(&self.text(child));
        }
        text
    }
}

#[derive(Clone, Copy)]
struct NodeRef<'a> {
    arena: &'a Arena,
    index: usize,
}

impl SelectorTarget for NodeRef<'_> {
    fn tag(&self) -> &str {
        &self.arena.nodes[self.index].node.tag
    }

    fn attr(&self, name: &str) -> Option<String> {
        let node = &self.arena.nodes[self.index].node;
        match name {
            "id" => node.id.clone(),
            "class" if !node.classes.is_empty() => Some(node.classes.join(" ")),
            _ => node.attrs.get(name).cloned(),
        }
    }

    fn has_class(&self, class: &str) -> bool {
        self.arena.nodes[self.index]
            .node
            .classes
            .iter()
            .any(|c| c == class)
    }

    fn parent(&self) -> Option<Self> {
        self.arena.nodes[self.index].parent.map(|index| NodeRef {
            arena: self.arena,
            index,
        })
    }
}

/// Mutable in-memory implementation of [`HostPage`].
#[derive(Debug)]
pub struct FixturePage {
    arena: Mutex<Arena>,
}

impl FixturePage {
    pub fn new(root: FixtureNode) -> Self {
        Self::with_url(root, &default_url())
    }

    pub fn with_url(root: FixtureNode, url: &str) -> Self {
        Self {
            arena: Mutex::new(Arena::build(root, Location::parse(url), default_viewport(), 0)),
        }
    }

    pub fn from_document(doc: FixtureDocument) -> Self {
        Self {
            arena: Mutex::new(Arena::build(doc.root, Location::parse(&doc.url), doc.viewport, 0)),
        }
    }

    /// Load a [`FixtureDocument`] from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let doc: FixtureDocument = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::from_document(doc))
    }

    fn arena(&self) -> MutexGuard<'_, Arena> {
        // No operation leaves the arena half-updated, so a poisoned lock
        // still guards a consistent document.
        match self.arena.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the whole document, as the host does when it re-renders.
    /// Handles from the previous document stop resolving.
    pub fn replace_root(&self, root: FixtureNode) {
        let mut arena = self.arena();
        let location = arena.location.clone();
        let viewport = arena.viewport;
        let actions = std::mem::take(&mut arena.actions);
        let generation = arena.generation + 1;
        *arena = Arena::build(root, location, viewport, generation);
        arena.actions = actions;
    }

    pub fn set_url(&self, url: &str) {
        self.arena().location = Location::parse(url);
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.arena().viewport = viewport;
    }

    /// Actions performed so far.
    pub fn actions(&self) -> Vec<FixtureAction> {
        self.arena().actions.clone()
    }

    /// Current value of an input set through [`HostPage::set_value`].
    pub fn value(&self, element: ElementId) -> Option<String> {
        let arena = self.arena();
        arena.index(element).map(|i| arena.nodes[i].value.clone())
    }

    /// Attribute lookup, for assertions.
    pub fn attr(&self, element: ElementId, name: &str) -> Option<String> {
        let arena = self.arena();
        let index = arena.index(element)?;
        let node = NodeRef {
            arena: &*arena,
            index,
        };
        node.attr(name)
    }
}

impl HostPage for FixturePage {
    fn location(&self) -> Location {
        self.arena().location.clone()
    }

    fn viewport(&self) -> Rect {
        self.arena().viewport
    }

    fn query_all(&self, scope: Option<ElementId>, selector: &str) -> Vec<ElementId> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        let arena = self.arena();
        let mut candidates = Vec::new();
        match scope {
            Some(id) => match arena.index(id) {
                Some(index) => arena.descendants(index, &mut candidates),
                None => return Vec::new(),
            },
            None => {
                candidates.push(0);
                arena.descendants(0, &mut candidates);
            }
        }
        candidates
            .into_iter()
            .filter(|&index| {
                selector.matches(&NodeRef {
                    arena: &*arena,
                    index,
                })
            })
            .map(|index| arena.handle(index))
            .collect()
    }

    fn closest(&self, element: ElementId, selector: &str) -> Option<ElementId> {
        let selector = Selector::parse(selector).ok()?;
        let arena = self.arena();
        let mut current = arena.index(element);
        while let Some(index) = current {
            if selector.matches(&NodeRef {
                arena: &*arena,
                index,
            }) {
                return Some(arena.handle(index));
            }
            current = arena.nodes[index].parent;
        }
        None
    }

    fn text(&self, element: ElementId) -> String {
        let arena = self.arena();
        arena
            .index(element)
            .map(|index| arena.text(index))
            .unwrap_or_default()
    }

    fn bounds(&self, element: ElementId) -> Option<Rect> {
        let arena = self.arena();
        arena.index(element).and_then(|i| arena.nodes[i].node.bounds)
    }

    fn click(&self, element: ElementId) -> bool {
        let mut arena = self.arena();
        let Some(index) = arena.index(element) else {
            return false;
        };
        arena.actions.push(FixtureAction::Click(element));
        if let Some(href) = arena.nodes[index].node.attrs.get("href").cloned() {
            arena.location = Location::parse(&href);
        }
        true
    }

    fn set_value(&self, element: ElementId, value: &str) -> bool {
        let mut arena = self.arena();
        let Some(index) = arena.index(element) else {
            return false;
        };
        arena.nodes[index].value = value.to_string();
        arena
            .actions
            .push(FixtureAction::SetValue(element, value.to_string()));
        true
    }

    fn submit(&self, element: ElementId) -> bool {
        let mut arena = self.arena();
        if arena.index(element).is_none() {
            return false;
        }
        arena.actions.push(FixtureAction::Submit(element));
        true
    }

    fn navigate(&self, url: &str) {
        let mut arena = self.arena();
        arena.location = Location::parse(url);
        arena.actions.push(FixtureAction::Navigate(url.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(tags: &[&str]) -> FixtureNode {
        FixtureNode::new("div")
            .with_attr("data-test-id", "workflows-list-item")
            .with_child(FixtureNode::new("ul").with_children(tags.iter().map(|t| {
                FixtureNode::new("li")
                    .with_attr("data-test-id", "tag")
                    .with_child(FixtureNode::new("span").with_text(*t))
            })))
    }

    fn page() -> FixturePage {
        FixturePage::new(
            FixtureNode::new("body").with_child(
                FixtureNode::new("div")
                    .with_class("workflows-list")
                    .with_children([card(&["foo", "bar"]), card(&["foo"])]),
            ),
        )
    }

    #[test]
    fn query_all_in_document_order() {
        let page = page();
        let labels = page.query_all(None, r#"li[data-test-id="tag"] > span"#);
        let texts: Vec<_> = labels.iter().map(|l| page.text(*l)).collect();
        assert_eq!(texts, vec!["foo", "bar", "foo"]);
    }

    #[test]
    fn scoped_query_and_closest() {
        let page = page();
        let cards = page.query_all(None, r#"[data-test-id="workflows-list-item"]"#);
        assert_eq!(cards.len(), 2);
        assert_eq!(page.query_all(Some(cards[1]), "span").len(), 1);

        let label = page.query(Some(cards[1]), "span").unwrap();
        assert_eq!(
            page.closest(label, r#"[data-test-id="workflows-list-item"]"#),
            Some(cards[1])
        );
        assert_eq!(page.closest(label, "nav"), None);
    }

    #[test]
    fn text_concatenates_descendants() {
        let page = page();
        let first = page.query(None, r#"[data-test-id="workflows-list-item"]"#).unwrap();
        assert_eq!(page.text(first), "foobar");
    }

    #[test]
    fn click_follows_href() {
        let page = FixturePage::with_url(
            FixtureNode::new("body").with_child(
                FixtureNode::new("a")
                    .with_attr("href", "/home/workflows")
                    .with_text("Reset"),
            ),
            "/home/workflows?tags=3",
        );
        let link = page.query(None, "a").unwrap();
        assert!(page.click(link));
        assert!(page.location().is_unfiltered("/home/workflows"));
        assert_eq!(page.actions(), vec![FixtureAction::Click(link)]);
    }

    #[test]
    fn replaced_document_invalidates_handles() {
        let page = page();
        let old = page.query(None, "span").unwrap();
        page.replace_root(FixtureNode::new("body").with_child(card(&["new"])));

        assert_eq!(page.text(old), "");
        assert!(!page.click(old));
        let fresh = page.query(None, "span").unwrap();
        assert_eq!(page.text(fresh), "new");
    }

    #[test]
    fn invalid_selector_matches_nothing() {
        assert!(page().query_all(None, "li[").is_empty());
    }

    #[test]
    fn document_loads_from_json() {
        let doc: FixtureDocument = serde_json::from_str(
            r#"{"url": "/home/workflows?x=1",
                "root": {"tag": "body", "children": [{"tag": "span", "text": "hi"}]}}"#,
        )
        .unwrap();
        let page = FixturePage::from_document(doc);
        assert_eq!(page.location().query, "x=1");
        assert_eq!(page.viewport().width, 1280.0);
        let span = page.query(None, "span").unwrap();
        assert_eq!(page.text(span), "hi");
    }
}
