//! Common test utilities for the sync engine tests
//!
//! Page builders that mimic the host's workflow list markup, plus scripted
//! stand-ins for the tag source and the navigation bridge.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folderview::{
    Extraction, FixtureNode, FixturePage, NavigationOutcome, Navigator, PersistedState, Selection,
    TagSnapshot, TagSource,
};
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const KEY: &str = "n8nFolderView";

// ============================================================================
// Host page builders
// ============================================================================

pub fn tag_label(name: &str) -> FixtureNode {
    FixtureNode::new("li")
        .with_attr("data-test-id", "tag")
        .with_attr("href", format!("/home/workflows?tags={}", name))
        .with_child(FixtureNode::new("span").with_text(name))
}

pub fn workflow_card(tags: &[&str]) -> FixtureNode {
    FixtureNode::new("div")
        .with_attr("data-test-id", "workflows-list-item")
        .with_children(tags.iter().map(|t| tag_label(t)))
}

/// A document with a sidebar, a reset control and one card per entry.
pub fn workflow_list(cards: &[&[&str]]) -> FixtureNode {
    FixtureNode::new("body").with_children([
        FixtureNode::new("nav").with_id("sidebar"),
        FixtureNode::new("a")
            .with_attr("data-test-id", "workflows-filter-reset")
            .with_attr("href", "/home/workflows"),
        FixtureNode::new("div")
            .with_class("workflows-list")
            .with_children(cards.iter().map(|tags| workflow_card(tags))),
    ])
}

pub fn page(cards: &[&[&str]]) -> Arc<FixturePage> {
    Arc::new(FixturePage::new(workflow_list(cards)))
}

// ============================================================================
// Persisted state
// ============================================================================

pub fn saved(
    tags: &[(&str, u64)],
    selected: Option<&str>,
    last_sync: Option<DateTime<Utc>>,
) -> PersistedState {
    PersistedState {
        selected_tag: selected.map(str::to_string),
        sort_order: None,
        all_tags: tags
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect::<IndexMap<_, _>>(),
        last_sync_time: last_sync.map(|t| t.timestamp_millis()),
    }
}

pub fn snapshot(pairs: &[(&str, u64)]) -> TagSnapshot {
    TagSnapshot::from_counts(pairs.iter().copied())
}

// ============================================================================
// Scripted collaborators
// ============================================================================

/// Hands out queued extractions in order, repeating the last one forever.
pub struct ScriptedSource {
    queue: Mutex<VecDeque<Extraction>>,
    last: Mutex<Extraction>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Extraction>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Extraction::Exhausted { attempts: 5 }),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(pairs: &[(&str, u64)]) -> Arc<Self> {
        Self::new([Extraction::Complete(snapshot(pairs))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagSource for ScriptedSource {
    async fn extract(&self) -> Extraction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(next) = next {
            *last = next;
        }
        last.clone()
    }
}

/// Records every selection instead of touching a page.
#[derive(Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<Selection>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Selection> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, selection: &Selection) -> usize {
        self.calls().iter().filter(|s| *s == selection).count()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn select(&self, selection: &Selection) -> NavigationOutcome {
        self.calls.lock().unwrap().push(selection.clone());
        match selection {
            Selection::All => NavigationOutcome::ResetClicked,
            Selection::Tag(_) => NavigationOutcome::ChipClicked { probe: 0 },
        }
    }
}
