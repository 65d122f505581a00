//! FolderList: the render-ready view derived from a TagStore

use super::store::{Selection, SortOrder, TagStore, ALL_FOLDER};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    /// The synthetic aggregate over every known tag
    All,
    Tag,
}

/// One rendered folder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub count: u64,
    pub kind: FolderKind,
    pub active: bool,
}

/// Complete folder list for one render pass.
///
/// The "All" folder comes first and always sums the whole store, whatever
/// the search filter. Tag folders follow, filtered by the search text and
/// ordered by the store's sort order. Sorting is stable, so ties keep the
/// store's insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderList {
    pub folders: Vec<Folder>,
    pub sort_order: SortOrder,
    pub search_filter: String,
}

impl FolderList {
    pub fn build(store: &TagStore) -> Self {
        let selected = store.selected();
        let needle = store.search_filter().to_lowercase();

        let mut tags: Vec<(&str, u64)> = store
            .tags()
            .filter(|(name, _)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .collect();
        tags.sort_by(|a, b| compare(store.sort_order(), a, b));

        let mut folders = Vec::with_capacity(tags.len() + 1);
        folders.push(Folder {
            name: ALL_FOLDER.to_string(),
            count: store.total(),
            kind: FolderKind::All,
            active: matches!(selected, Some(Selection::All)),
        });
        folders.extend(tags.into_iter().map(|(name, count)| Folder {
            name: name.to_string(),
            count,
            kind: FolderKind::Tag,
            active: matches!(selected, Some(Selection::Tag(s)) if s == name),
        }));

        Self {
            folders,
            sort_order: store.sort_order(),
            search_filter: store.search_filter().to_string(),
        }
    }

    /// The highlighted folder, if any.
    pub fn active(&self) -> Option<&Folder> {
        self.folders.iter().find(|f| f.active)
    }

    pub fn names(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

fn compare(order: SortOrder, a: &(&str, u64), b: &(&str, u64)) -> Ordering {
    match order {
        SortOrder::NameAsc => compare_names(a.0, b.0),
        SortOrder::NameDesc => compare_names(b.0, a.0),
        SortOrder::CountDesc => b.1.cmp(&a.1),
        SortOrder::CountAsc => a.1.cmp(&b.1),
    }
}

/// Case-insensitive first, then by code point so the order is total.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
