//! Probe strategies against the host document
//!
//! Host markup drifts between releases, so every lookup is an ordered list
//! of probes tried in turn; the first probe that yields a result wins. The
//! lists come from configuration, which keeps selector churn away from the
//! merge and cleanup logic.

use super::{ElementId, HostPage};
use crate::tags::{SnapshotBuilder, TagSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Run probes in order and return the index and result of the first hit.
pub fn first_match<P, T>(probes: &[P], mut run: impl FnMut(&P) -> Option<T>) -> Option<(usize, T)> {
    probes
        .iter()
        .enumerate()
        .find_map(|(i, probe)| run(probe).map(|value| (i, value)))
}

/// A way of reading tag counts out of the host document.
///
/// Every probe counts a tag once per workflow card that carries it.
/// `None` means the probe's anchor elements are not on the page (try the
/// next probe); `Some` with an empty snapshot means the page was read and
/// holds no tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagProbe {
    /// Walk workflow cards and read the labels inside each.
    Cards { card: String, label: String },
    /// Read labels anywhere, grouping each by its enclosing card. A label
    /// outside any card counts as a card of its own.
    Labels { label: String, card: String },
    /// The host is showing its empty-list state: zero workflows, zero tags.
    Empty { marker: String },
}

impl TagProbe {
    pub fn probe(&self, page: &dyn HostPage) -> Option<TagSnapshot> {
        match self {
            Self::Cards { card, label } => {
                let cards = page.query_all(None, card);
                if cards.is_empty() {
                    return None;
                }
                let mut builder = SnapshotBuilder::new();
                for card in cards {
                    let labels = page.query_all(Some(card), label);
                    builder.record_card(labels.into_iter().map(|l| page.text(l)));
                }
                Some(builder.build())
            }
            Self::Labels { label, card } => {
                let labels = page.query_all(None, label);
                if labels.is_empty() {
                    return None;
                }
                // Group by enclosing card, keeping first-seen order.
                let mut order: Vec<ElementId> = Vec::new();
                let mut groups: HashMap<ElementId, Vec<String>> = HashMap::new();
                for el in labels {
                    let owner = page.closest(el, card).unwrap_or(el);
                    let group = groups.entry(owner).or_insert_with(|| {
                        order.push(owner);
                        Vec::new()
                    });
                    group.push(page.text(el));
                }
                let mut builder = SnapshotBuilder::new();
                for owner in order {
                    if let Some(texts) = groups.remove(&owner) {
                        builder.record_card(texts);
                    }
                }
                Some(builder.build())
            }
            Self::Empty { marker } => page.query(None, marker).map(|_| TagSnapshot::empty()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Cards { card, .. } => format!("cards({})", card),
            Self::Labels { label, .. } => format!("labels({})", label),
            Self::Empty { marker } => format!("empty({})", marker),
        }
    }
}

/// A way of locating the host's navigation sidebar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SidebarProbe {
    /// A semantic selector.
    Selector { selector: String },
    /// Layout heuristic: among `candidates`, the first element that is tall
    /// (at least `min_height_ratio` of the viewport), narrow (at most
    /// `max_width` px) and hugging the left edge (x at most `max_left` px).
    Layout {
        candidates: String,
        min_height_ratio: f64,
        max_width: f64,
        max_left: f64,
    },
}

impl SidebarProbe {
    pub fn locate(&self, page: &dyn HostPage) -> Option<ElementId> {
        match self {
            Self::Selector { selector } => page.query(None, selector),
            Self::Layout {
                candidates,
                min_height_ratio,
                max_width,
                max_left,
            } => {
                let viewport = page.viewport();
                page.query_all(None, candidates).into_iter().find(|el| {
                    page.bounds(*el).is_some_and(|b| {
                        b.height >= viewport.height * min_height_ratio
                            && b.width > 0.0
                            && b.width <= *max_width
                            && b.x <= *max_left
                    })
                })
            }
        }
    }
}

/// A structural hypothesis for where the host renders clickable tag chips.
/// A chip matches when its trimmed text equals the tag name exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipProbe {
    pub selector: String,
}

impl ChipProbe {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn find(&self, page: &dyn HostPage, tag: &str) -> Option<ElementId> {
        page.query_all(None, &self.selector)
            .into_iter()
            .find(|el| page.text(*el).trim() == tag)
    }
}

/// Where the host's generic text filter lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInputProbe {
    pub selector: String,
}

impl FilterInputProbe {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }

    pub fn find(&self, page: &dyn HostPage) -> Option<ElementId> {
        page.query(None, &self.selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FixtureNode, FixturePage, Rect};

    const CARD: &str = r#"[data-test-id="workflows-list-item"]"#;
    const LABEL: &str = r#"li[data-test-id="tag"] > span"#;

    fn label(text: &str) -> FixtureNode {
        FixtureNode::new("li")
            .with_attr("data-test-id", "tag")
            .with_child(FixtureNode::new("span").with_text(text))
    }

    fn card(tags: &[&str]) -> FixtureNode {
        FixtureNode::new("div")
            .with_attr("data-test-id", "workflows-list-item")
            .with_children(tags.iter().map(|t| label(t)))
    }

    #[test]
    fn first_match_reports_winning_index() {
        let probes = [1, 2, 3, 4];
        assert_eq!(first_match(&probes, |p| (*p > 2).then_some(p * 10)), Some((2, 30)));
        assert_eq!(first_match(&probes, |_| None::<()>), None);
    }

    #[test]
    fn cards_probe_counts_per_card() {
        let page = FixturePage::new(
            FixtureNode::new("body").with_children([card(&["foo", "foo", "bar"]), card(&["foo"])]),
        );
        let probe = TagProbe::Cards {
            card: CARD.into(),
            label: LABEL.into(),
        };
        let snapshot = probe.probe(&page).unwrap();
        assert_eq!(snapshot.get("foo"), Some(2));
        assert_eq!(snapshot.get("bar"), Some(1));
    }

    #[test]
    fn cards_probe_without_cards_declines() {
        let page = FixturePage::new(FixtureNode::new("body").with_child(label("orphan")));
        let probe = TagProbe::Cards {
            card: CARD.into(),
            label: LABEL.into(),
        };
        assert!(probe.probe(&page).is_none());
    }

    #[test]
    fn cards_without_labels_mean_zero_tags() {
        let page = FixturePage::new(FixtureNode::new("body").with_child(card(&[])));
        let probe = TagProbe::Cards {
            card: CARD.into(),
            label: LABEL.into(),
        };
        assert_eq!(probe.probe(&page), Some(TagSnapshot::empty()));
    }

    #[test]
    fn labels_probe_uses_the_same_counting_rule() {
        let page = FixturePage::new(FixtureNode::new("body").with_children([
            card(&["foo", "foo"]),
            label("foo"),
            label("foo"),
        ]));
        let probe = TagProbe::Labels {
            label: LABEL.into(),
            card: CARD.into(),
        };
        // one card plus two loose labels
        assert_eq!(probe.probe(&page).unwrap().get("foo"), Some(3));
    }

    #[test]
    fn empty_marker_yields_empty_snapshot() {
        let page = FixturePage::new(
            FixtureNode::new("body").with_child(FixtureNode::new("div").with_attr("data-test-id", "list-empty")),
        );
        let probe = TagProbe::Empty {
            marker: r#"[data-test-id="list-empty"]"#.into(),
        };
        assert_eq!(probe.probe(&page), Some(TagSnapshot::empty()));
    }

    #[test]
    fn sidebar_layout_heuristic() {
        let page = FixturePage::new(FixtureNode::new("body").with_children([
            FixtureNode::new("div").with_bounds(Rect::new(0.0, 0.0, 1280.0, 60.0)),
            FixtureNode::new("div")
                .with_id("nav")
                .with_bounds(Rect::new(0.0, 60.0, 220.0, 740.0)),
        ]));
        let probe = SidebarProbe::Layout {
            candidates: "div".into(),
            min_height_ratio: 0.7,
            max_width: 400.0,
            max_left: 10.0,
        };
        let found = probe.locate(&page).unwrap();
        assert_eq!(page.attr(found, "id").as_deref(), Some("nav"));

        let semantic = SidebarProbe::Selector {
            selector: "#sidebar".into(),
        };
        assert!(semantic.locate(&page).is_none());
    }

    #[test]
    fn chip_probe_requires_exact_text() {
        let page = FixturePage::new(
            FixtureNode::new("body").with_children([label("foobar"), label(" foo ")]),
        );
        let chip = ChipProbe::new(r#"li[data-test-id="tag"]"#).find(&page, "foo").unwrap();
        assert_eq!(page.text(chip).trim(), "foo");
        assert!(ChipProbe::new("li").find(&page, "fo").is_none());
    }
}
