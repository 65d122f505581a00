//! TagSnapshot: the result of a single extraction pass

use super::store::ALL_FOLDER;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Normalize a raw label into a tag name.
///
/// Trims surrounding whitespace. Returns `None` for empty labels and for the
/// reserved `"All"` name, which is never a real tag.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name == ALL_FOLDER {
        return None;
    }
    Some(name.to_string())
}

/// Mapping of tag name to the number of workflow cards carrying it.
///
/// Iteration follows discovery order in the host page. A snapshot is never
/// mutated after it is built; the next extraction produces a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    counts: IndexMap<String, u64>,
}

impl TagSnapshot {
    /// An empty snapshot ("host has no tags").
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from explicit counts. Invalid names are dropped and
    /// repeated names are summed.
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut map: IndexMap<String, u64> = IndexMap::new();
        for (raw, count) in counts {
            if let Some(name) = normalize_tag_name(raw.as_ref()) {
                *map.entry(name).or_insert(0) += count;
            }
        }
        Self { counts: map }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counts.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Tags and counts in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Accumulates card-grouped label occurrences into a [`TagSnapshot`].
///
/// A tag is counted at most once per card, however many labels inside that
/// card carry it.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    counts: IndexMap<String, u64>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the labels found inside one workflow card.
    pub fn record_card<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        for label in labels {
            let Some(name) = normalize_tag_name(label.as_ref()) else {
                continue;
            };
            if seen.insert(name.clone()) {
                *self.counts.entry(name).or_insert(0) += 1;
            }
        }
    }

    pub fn build(self) -> TagSnapshot {
        TagSnapshot {
            counts: self.counts,
        }
    }
}
