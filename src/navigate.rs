//! Navigation bridge: drive the host's own filtering UI
//!
//! Selecting a folder is translated into clicks on the host page. The
//! bridge is fire-and-forget for the engine; the returned
//! [`NavigationOutcome`] exists for logging and tests.

use crate::config::{FolderViewConfig, TimingConfig};
use crate::host::{first_match, wait_until, ChipProbe, ElementId, FilterInputProbe, HostPage};
use crate::tags::Selection;
use async_trait::async_trait;
use std::sync::Arc;

/// What a selection ended up doing on the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Not on the workflow list; nothing was touched.
    OffRoute,
    /// "All": the list was already unfiltered; nothing was touched.
    AlreadyUnfiltered,
    /// "All": the host's reset-filters control was clicked.
    ResetClicked,
    /// "All": no reset control appeared, so the unfiltered list was loaded.
    NavigatedToList,
    /// A tag chip was clicked; `probe` is the index of the winning hypothesis.
    ChipClicked { probe: usize },
    /// No chip found; the tag was typed into a filter input.
    FilterTyped { probe: usize },
    /// Every strategy failed.
    NotFound,
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn select(&self, selection: &Selection) -> NavigationOutcome;
}

pub struct NavigationBridge {
    page: Arc<dyn HostPage>,
    workflow_list: String,
    reset: Vec<String>,
    chips: Vec<ChipProbe>,
    filter_inputs: Vec<FilterInputProbe>,
    timing: TimingConfig,
}

impl NavigationBridge {
    pub fn new(page: Arc<dyn HostPage>, config: &FolderViewConfig) -> Self {
        Self {
            page,
            workflow_list: config.routes.workflow_list.clone(),
            reset: config.probes.reset.clone(),
            chips: config.probes.chips.clone(),
            filter_inputs: config.probes.filter_inputs.clone(),
            timing: config.timing.clone(),
        }
    }

    /// On the workflow list with no filter applied.
    pub fn is_unfiltered(&self) -> bool {
        self.page.location().is_unfiltered(&self.workflow_list)
    }

    fn find_reset(&self) -> Option<ElementId> {
        first_match(&self.reset, |selector| self.page.query(None, selector)).map(|(_, el)| el)
    }

    async fn wait_for_reset(&self) -> Option<ElementId> {
        wait_until(self.timing.poll_interval(), self.timing.reset_wait(), || {
            self.find_reset()
        })
        .await
    }

    async fn show_all(&self) -> NavigationOutcome {
        // The host hides its reset control while no filter is active.
        if self.is_unfiltered() {
            return NavigationOutcome::AlreadyUnfiltered;
        }
        match self.wait_for_reset().await {
            Some(reset) if self.page.click(reset) => NavigationOutcome::ResetClicked,
            _ => {
                tracing::debug!(route = %self.workflow_list, "reset control not found, navigating");
                self.page.navigate(&self.workflow_list);
                NavigationOutcome::NavigatedToList
            }
        }
    }

    /// Clear any active filter and wait until the host reports the
    /// unfiltered list.
    async fn clear_filters(&self) {
        if self.is_unfiltered() {
            return;
        }
        if !matches!(self.show_all().await, NavigationOutcome::ResetClicked | NavigationOutcome::NavigatedToList) {
            return;
        }
        let cleared = wait_until(self.timing.poll_interval(), self.timing.unfiltered_wait(), || {
            self.is_unfiltered().then_some(())
        })
        .await;
        if cleared.is_none() {
            tracing::warn!(location = %self.page.location(), "filters did not clear in time");
        }
    }

    async fn show_tag(&self, tag: &str) -> NavigationOutcome {
        self.clear_filters().await;

        let chip = wait_until(self.timing.poll_interval(), self.timing.chip_wait(), || {
            first_match(&self.chips, |probe| probe.find(self.page.as_ref(), tag))
        })
        .await;
        if let Some((probe, el)) = chip {
            if self.page.click(el) {
                return NavigationOutcome::ChipClicked { probe };
            }
        }

        if let Some((probe, input)) =
            first_match(&self.filter_inputs, |p| p.find(self.page.as_ref()))
        {
            if self.page.set_value(input, tag) && self.page.submit(input) {
                return NavigationOutcome::FilterTyped { probe };
            }
        }

        tracing::warn!(tag, "no tag filter control found");
        NavigationOutcome::NotFound
    }
}

#[async_trait]
impl Navigator for NavigationBridge {
    async fn select(&self, selection: &Selection) -> NavigationOutcome {
        let location = self.page.location();
        if !location.is_on(&self.workflow_list) {
            tracing::debug!(%location, "not on the workflow list, ignoring selection");
            return NavigationOutcome::OffRoute;
        }
        match selection {
            Selection::All => self.show_all().await,
            Selection::Tag(tag) => self.show_tag(tag).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fixture::FixtureAction;
    use crate::host::{FixtureNode, FixturePage};
    use std::time::Duration;
    use tokio::time::Instant;

    fn reset_link() -> FixtureNode {
        FixtureNode::new("a")
            .with_attr("data-test-id", "workflows-filter-reset")
            .with_attr("href", "/home/workflows")
            .with_text("Remove filters")
    }

    fn chip(tag: &str, id: u32) -> FixtureNode {
        FixtureNode::new("li")
            .with_attr("data-test-id", "tag")
            .with_attr("href", format!("/home/workflows?tags={}", id))
            .with_child(FixtureNode::new("span").with_text(tag))
    }

    fn search_input() -> FixtureNode {
        FixtureNode::new("input").with_attr("type", "search")
    }

    fn bridge(page: &Arc<FixturePage>) -> NavigationBridge {
        NavigationBridge::new(page.clone(), &FolderViewConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn off_route_is_a_no_op() {
        let page = Arc::new(FixturePage::with_url(
            FixtureNode::new("body").with_children([reset_link(), chip("foo", 1)]),
            "/workflow/42",
        ));
        let outcome = bridge(&page).select(&Selection::Tag("foo".into())).await;
        assert_eq!(outcome, NavigationOutcome::OffRoute);
        assert!(page.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn all_clicks_reset_control() {
        let page = Arc::new(FixturePage::with_url(
            FixtureNode::new("body").with_child(reset_link()),
            "/home/workflows?tags=1",
        ));
        let outcome = bridge(&page).select(&Selection::All).await;
        assert_eq!(outcome, NavigationOutcome::ResetClicked);
        assert!(page.location().is_unfiltered("/home/workflows"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_falls_back_to_navigation_after_timeout() {
        let page = Arc::new(FixturePage::with_url(
            FixtureNode::new("body"),
            "/home/workflows?tags=1",
        ));
        let start = Instant::now();
        let outcome = bridge(&page).select(&Selection::All).await;

        assert_eq!(outcome, NavigationOutcome::NavigatedToList);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(
            page.actions(),
            vec![FixtureAction::Navigate("/home/workflows".into())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn all_on_unfiltered_list_touches_nothing() {
        let page = Arc::new(FixturePage::new(FixtureNode::new("body")));
        let start = Instant::now();
        let outcome = bridge(&page).select(&Selection::All).await;

        assert_eq!(outcome, NavigationOutcome::AlreadyUnfiltered);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(page.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tag_on_unfiltered_list_clicks_matching_chip() {
        let page = Arc::new(FixturePage::new(
            FixtureNode::new("body").with_children([chip("foobar", 1), chip("foo", 2)]),
        ));
        let outcome = bridge(&page).select(&Selection::Tag("foo".into())).await;

        assert_eq!(outcome, NavigationOutcome::ChipClicked { probe: 0 });
        assert_eq!(page.location().query, "tags=2");
    }

    #[tokio::test(start_paused = true)]
    async fn tag_on_filtered_list_resets_first() {
        let page = Arc::new(FixturePage::with_url(
            FixtureNode::new("body").with_children([reset_link(), chip("foo", 1), chip("bar", 2)]),
            "/home/workflows?tags=1",
        ));
        let outcome = bridge(&page).select(&Selection::Tag("bar".into())).await;

        assert_eq!(outcome, NavigationOutcome::ChipClicked { probe: 0 });
        assert_eq!(page.location().query, "tags=2");
        let clicks = page
            .actions()
            .into_iter()
            .filter(|a| matches!(a, FixtureAction::Click(_)))
            .count();
        assert_eq!(clicks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn tag_without_chip_types_into_filter() {
        let page = Arc::new(FixturePage::new(
            FixtureNode::new("body").with_child(search_input()),
        ));
        let outcome = bridge(&page).select(&Selection::Tag("ops".into())).await;

        assert_eq!(outcome, NavigationOutcome::FilterTyped { probe: 1 });
        let input = page.query(None, "input").unwrap();
        assert_eq!(page.value(input).as_deref(), Some("ops"));
        assert!(page.actions().contains(&FixtureAction::Submit(input)));
    }

    #[tokio::test(start_paused = true)]
    async fn tag_with_nothing_to_click_is_not_found() {
        let page = Arc::new(FixturePage::new(FixtureNode::new("body")));
        let outcome = bridge(&page).select(&Selection::Tag("ops".into())).await;
        assert_eq!(outcome, NavigationOutcome::NotFound);
    }
}
