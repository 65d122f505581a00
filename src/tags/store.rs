//! TagStore: the authoritative superset of known tags

use super::snapshot::{normalize_tag_name, TagSnapshot};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the synthetic aggregate folder. Never stored as a tag.
pub const ALL_FOLDER: &str = "All";

/// Folder list ordering. The "All" folder is always rendered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    NameAsc,
    NameDesc,
    CountDesc,
    CountAsc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::CountDesc,
        SortOrder::CountAsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameAsc => "name-asc",
            Self::NameDesc => "name-desc",
            Self::CountDesc => "count-desc",
            Self::CountAsc => "count-asc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| format!("unknown sort order: {}", s))
    }
}

/// The folder the user has chosen.
///
/// Serializes as a plain string; `"All"` is the aggregate sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selection {
    All,
    Tag(String),
}

impl Selection {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_FOLDER,
            Self::Tag(name) => name,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<String> for Selection {
    fn from(s: String) -> Self {
        if s == ALL_FOLDER {
            Self::All
        } else {
            Self::Tag(s)
        }
    }
}

impl From<&str> for Selection {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Selection> for String {
    fn from(s: Selection) -> Self {
        match s {
            Selection::All => ALL_FOLDER.to_string(),
            Selection::Tag(name) => name,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Tags that were not known before
    pub inserted: Vec<String>,
    /// Known tags whose count went up
    pub raised: Vec<String>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty() || !self.raised.is_empty()
    }
}

/// What a prune against ground truth removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    pub removed: Vec<String>,
    /// True if the selected tag was among the removed ones and the
    /// selection fell back to "All"
    pub selection_reset: bool,
}

/// Single source of truth for the folder view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagStore {
    all_tags: IndexMap<String, u64>,
    selected: Option<Selection>,
    sort_order: SortOrder,
    search_filter: String,
    last_sync: Option<DateTime<Utc>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts. Invalid tag names are dropped.
    pub fn from_parts<I>(
        all_tags: I,
        selected: Option<Selection>,
        sort_order: SortOrder,
        last_sync: Option<DateTime<Utc>>,
    ) -> Self
    where
        I: IntoIterator<Item = (String, u64)>,
    {
        let mut tags = IndexMap::new();
        for (raw, count) in all_tags {
            if let Some(name) = normalize_tag_name(&raw) {
                tags.insert(name, count);
            }
        }
        Self {
            all_tags: tags,
            selected,
            sort_order,
            search_filter: String::new(),
            last_sync,
        }
    }

    // === Reading ===

    pub fn count(&self, name: &str) -> Option<u64> {
        self.all_tags.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all_tags.contains_key(name)
    }

    /// Known tags in insertion order.
    pub fn tags(&self) -> impl Iterator<Item = (&str, u64)> {
        self.all_tags.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.all_tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_tags.is_empty()
    }

    /// Count shown on the "All" folder.
    pub fn total(&self) -> u64 {
        self.all_tags.values().sum()
    }

    pub fn selected(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn search_filter(&self) -> &str {
        &self.search_filter
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// True if more than `max_age` has passed since the last sync, or if
    /// the store has never synced.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_sync {
            Some(at) => now.signed_duration_since(at) > max_age,
            None => true,
        }
    }

    // === Sync mutations ===

    /// Merge a snapshot into the superset.
    ///
    /// Unknown tags are inserted, known tags are raised only when the
    /// snapshot count is strictly greater, and tags absent from the
    /// snapshot are left alone. The sync time is stamped when anything
    /// changed.
    pub fn merge(&mut self, snapshot: &TagSnapshot, now: DateTime<Utc>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for (name, count) in snapshot.iter() {
            match self.all_tags.get_mut(name) {
                Some(stored) => {
                    if count > *stored {
                        *stored = count;
                        outcome.raised.push(name.to_string());
                    }
                }
                None => {
                    self.all_tags.insert(name.to_string(), count);
                    outcome.inserted.push(name.to_string());
                }
            }
        }
        if outcome.changed() {
            self.last_sync = Some(now);
        }
        outcome
    }

    /// Remove every tag absent from `truth` and stamp the sync time.
    ///
    /// Callers must only pass a snapshot obtained from a complete
    /// extraction; an exhausted extraction is not ground truth.
    pub fn prune_absent(&mut self, truth: &TagSnapshot, now: DateTime<Utc>) -> PruneOutcome {
        let mut removed = Vec::new();
        self.all_tags.retain(|name, _| {
            let keep = truth.contains(name);
            if !keep {
                removed.push(name.clone());
            }
            keep
        });
        let selection_reset = self.reset_selection_if_removed(&removed);
        self.last_sync = Some(now);
        PruneOutcome {
            removed,
            selection_reset,
        }
    }

    fn reset_selection_if_removed(&mut self, removed: &[String]) -> bool {
        match &self.selected {
            Some(Selection::Tag(name)) if removed.iter().any(|r| r == name) => {
                self.selected = Some(Selection::All);
                true
            }
            _ => false,
        }
    }

    // === User actions ===

    /// Manually remove a tag. Returns the outcome, or `None` if the tag
    /// was not known.
    pub fn remove_tag(&mut self, name: &str) -> Option<PruneOutcome> {
        self.all_tags.shift_remove(name)?;
        let removed = vec![name.to_string()];
        let selection_reset = self.reset_selection_if_removed(&removed);
        Some(PruneOutcome {
            removed,
            selection_reset,
        })
    }

    /// Record the user's folder choice. A selection naming an unknown tag
    /// is kept as-is; it simply won't be highlighted.
    pub fn select(&mut self, selection: Selection) {
        self.selected = Some(selection);
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    pub fn set_search_filter(&mut self, filter: impl Into<String>) {
        self.search_filter = filter.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn sort_order_string_forms() {
        for order in SortOrder::ALL {
            assert_eq!(order.as_str().parse::<SortOrder>().unwrap(), order);
        }
        assert!("size-asc".parse::<SortOrder>().is_err());
        assert_eq!(
            serde_json::to_string(&SortOrder::CountDesc).unwrap(),
            "\"count-desc\""
        );
    }

    #[test]
    fn selection_serializes_as_plain_string() {
        assert_eq!(serde_json::to_string(&Selection::All).unwrap(), "\"All\"");
        let tag: Selection = serde_json::from_str("\"ops\"").unwrap();
        assert_eq!(tag, Selection::Tag("ops".to_string()));
    }

    #[test]
    fn merge_without_change_keeps_sync_time() {
        let mut store = TagStore::new();
        store.merge(&TagSnapshot::from_counts([("a", 2)]), at(1_000));
        let outcome = store.merge(&TagSnapshot::from_counts([("a", 1)]), at(2_000));

        assert!(!outcome.changed());
        assert_eq!(store.count("a"), Some(2));
        assert_eq!(store.last_sync(), Some(at(1_000)));
    }

    #[test]
    fn staleness_without_sync_is_stale() {
        let store = TagStore::new();
        assert!(store.is_stale(at(0), Duration::hours(24)));
    }

    #[test]
    fn remove_tag_resets_matching_selection() {
        let mut store = TagStore::new();
        store.merge(&TagSnapshot::from_counts([("a", 1), ("b", 1)]), at(0));
        store.select(Selection::Tag("a".into()));

        assert!(store.remove_tag("missing").is_none());
        let outcome = store.remove_tag("a").unwrap();
        assert!(outcome.selection_reset);
        assert_eq!(store.selected(), Some(&Selection::All));
        assert_eq!(store.len(), 1);
    }
}
