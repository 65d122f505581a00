//! Cleanup: drop tags that no longer exist on the host
//!
//! Merging only ever grows the store, so deleted tags would linger forever
//! without this. Cleanup takes a complete extraction of the unfiltered
//! workflow list as ground truth and prunes everything absent from it. It
//! never prunes on an exhausted extraction; only a page that was read and
//! found empty may empty the store. The engine checks the host location
//! before handing a snapshot to [`CleanupScheduler::prune`].

use crate::config::TimingConfig;
use crate::extract::Extraction;
use crate::tags::{PruneOutcome, TagStore};
use chrono::{DateTime, Duration, Utc};

/// Result of one cleanup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupReport {
    /// Not forced, and the store was synced recently enough.
    NotDue,
    /// No ground truth: extraction ran out of attempts, or the host list
    /// was filtered. The store was left alone.
    Inconclusive,
    Pruned(PruneOutcome),
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        match self {
            Self::Pruned(outcome) => outcome.removed.len(),
            _ => 0,
        }
    }

    /// True when the selected tag was dropped and selection fell back to "All".
    pub fn selection_reset(&self) -> bool {
        matches!(self, Self::Pruned(outcome) if outcome.selection_reset)
    }

    /// True when the store was modified in any way.
    pub fn touched_store(&self) -> bool {
        matches!(self, Self::Pruned(_))
    }
}

/// Decides when cleanup runs and performs it.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    every: u32,
    passes: u32,
    staleness: Duration,
    startup_staleness: Duration,
}

impl CleanupScheduler {
    pub fn new(timing: &TimingConfig) -> Self {
        Self {
            every: timing.cleanup_every_passes.max(1),
            passes: 0,
            staleness: timing.cleanup_staleness(),
            startup_staleness: timing.startup_staleness(),
        }
    }

    /// Count one reconciliation pass. Returns true on every Nth pass.
    pub fn tick(&mut self) -> bool {
        self.passes = self.passes.wrapping_add(1);
        self.passes % self.every == 0
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Startup forces a cleanup when the store has gone unsynced for long.
    /// An empty store has nothing to prune.
    pub fn due_at_startup(&self, store: &TagStore, now: DateTime<Utc>) -> bool {
        !store.is_empty() && store.is_stale(now, self.startup_staleness)
    }

    /// Unforced cleanup only runs once the store has gone a day unsynced.
    pub fn is_due(&self, store: &TagStore, force: bool, now: DateTime<Utc>) -> bool {
        force || store.is_stale(now, self.staleness)
    }

    /// Prune `store` against `truth`, which must be an extraction of the
    /// unfiltered workflow list.
    pub fn prune(
        &self,
        store: &mut TagStore,
        truth: &Extraction,
        now: DateTime<Utc>,
    ) -> CleanupReport {
        let truth = match truth {
            Extraction::Complete(snapshot) => snapshot,
            Extraction::Exhausted { attempts } => {
                tracing::warn!(attempts, "cleanup skipped, host page could not be read");
                return CleanupReport::Inconclusive;
            }
        };

        let outcome = store.prune_absent(truth, now);
        if outcome.removed.is_empty() {
            tracing::debug!("cleanup found nothing to remove");
        } else {
            tracing::info!(
                removed = outcome.removed.len(),
                tags = ?outcome.removed,
                selection_reset = outcome.selection_reset,
                "removed tags no longer on the host"
            );
        }
        CleanupReport::Pruned(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Selection, TagSnapshot};

    fn complete(pairs: &[(&str, u64)]) -> Extraction {
        Extraction::Complete(TagSnapshot::from_counts(pairs.iter().copied()))
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    fn store_with(pairs: &[(&str, u64)], synced: DateTime<Utc>) -> TagStore {
        let mut store = TagStore::new();
        store.merge(&TagSnapshot::from_counts(pairs.iter().copied()), synced);
        store
    }

    fn scheduler() -> CleanupScheduler {
        CleanupScheduler::new(&TimingConfig::default())
    }

    #[test]
    fn prune_removes_exactly_the_missing_tag() {
        let mut store = store_with(&[("a", 1), ("b", 2), ("c", 3)], at(0));
        let report = scheduler().prune(&mut store, &complete(&[("a", 1), ("c", 3)]), at(1));

        assert_eq!(report.removed_count(), 1);
        assert!(!store.contains("b"));
        assert_eq!(store.len(), 2);
        assert_eq!(store.last_sync(), Some(at(1)));
    }

    #[test]
    fn exhausted_extraction_never_prunes() {
        let mut store = store_with(&[("a", 1), ("b", 2)], at(0));
        let before = store.clone();
        let report = scheduler().prune(&mut store, &Extraction::Exhausted { attempts: 5 }, at(1));

        assert_eq!(report, CleanupReport::Inconclusive);
        assert_eq!(report.removed_count(), 0);
        assert!(!report.touched_store());
        assert_eq!(store, before);
    }

    #[test]
    fn empty_page_empties_the_store() {
        let mut store = store_with(&[("a", 1), ("b", 2)], at(0));
        let report = scheduler().prune(&mut store, &complete(&[]), at(1));

        assert_eq!(report.removed_count(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn unforced_cleanup_waits_for_staleness() {
        let synced = at(0);
        let store = store_with(&[("a", 1), ("b", 2)], synced);
        let scheduler = scheduler();

        assert!(!scheduler.is_due(&store, false, synced + Duration::hours(23)));
        assert!(scheduler.is_due(&store, true, synced + Duration::hours(23)));
        assert!(scheduler.is_due(&store, false, synced + Duration::hours(25)));
    }

    #[test]
    fn removing_selected_tag_reports_selection_reset() {
        let mut store = store_with(&[("a", 1), ("b", 2)], at(0));
        store.select(Selection::Tag("b".into()));
        let report = scheduler().prune(&mut store, &complete(&[("a", 1)]), at(1));

        assert!(report.selection_reset());
        assert_eq!(store.selected(), Some(&Selection::All));
    }

    #[test]
    fn pruning_leaves_a_stale_selection_alone() {
        let mut store = store_with(&[("a", 1)], at(0));
        store.select(Selection::Tag("gone".into()));
        let report = scheduler().prune(&mut store, &complete(&[("a", 1)]), at(1));

        assert_eq!(report.removed_count(), 0);
        assert!(!report.selection_reset());
        assert_eq!(store.selected(), Some(&Selection::Tag("gone".into())));
    }

    #[test]
    fn tick_fires_on_every_tenth_pass() {
        let mut scheduler = scheduler();
        let fired: Vec<u32> = (1..=30).filter(|_| scheduler.tick()).collect();
        assert_eq!(fired, vec![10, 20, 30]);
        assert_eq!(scheduler.passes(), 30);
    }

    #[test]
    fn startup_cleanup_needs_a_week_of_staleness() {
        let scheduler = scheduler();
        let store = store_with(&[("a", 1)], at(0));
        assert!(!scheduler.due_at_startup(&store, at(0) + Duration::days(6)));
        assert!(scheduler.due_at_startup(&store, at(0) + Duration::days(8)));
        assert!(!scheduler.due_at_startup(&TagStore::new(), at(0) + Duration::days(8)));
    }
}
