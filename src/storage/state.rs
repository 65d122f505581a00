//! The persisted record and its conversion to and from a TagStore

use crate::tags::{Selection, SortOrder, TagStore};
use chrono::DateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Serialized shape of the folder view state.
///
/// ```json
/// { "selectedTag": "ops", "sortOrder": "name-asc",
///   "allTags": { "ops": 3 }, "lastSyncTime": 1700000000000 }
/// ```
///
/// Every field is optional on load so that records written by older
/// versions (which only saved the selection and sort order) still restore.
/// The search filter is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub selected_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_sort_order")]
    pub sort_order: Option<SortOrder>,
    #[serde(default)]
    pub all_tags: IndexMap<String, u64>,
    /// Epoch milliseconds
    #[serde(default)]
    pub last_sync_time: Option<i64>,
}

impl PersistedState {
    /// Capture the persistent parts of a store.
    pub fn capture(store: &TagStore) -> Self {
        Self {
            selected_tag: store.selected().map(|s| s.as_str().to_string()),
            sort_order: Some(store.sort_order()),
            all_tags: store
                .tags()
                .map(|(name, count)| (name.to_string(), count))
                .collect(),
            last_sync_time: store.last_sync().map(|t| t.timestamp_millis()),
        }
    }

    /// Rebuild a store. Missing fields fall back to defaults.
    pub fn restore(self) -> TagStore {
        TagStore::from_parts(
            self.all_tags,
            self.selected_tag.map(Selection::from),
            self.sort_order.unwrap_or_default(),
            self.last_sync_time.and_then(DateTime::from_timestamp_millis),
        )
    }
}

/// An unrecognized sort order is treated as absent rather than failing the
/// whole record.
fn lenient_sort_order<'de, D>(deserializer: D) -> Result<Option<SortOrder>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}
