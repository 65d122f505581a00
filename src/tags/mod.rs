//! Tag data structures
//!
//! - **TagSnapshot**: one extraction pass, immutable once built
//! - **TagStore**: the authoritative superset of every tag seen, plus the
//!   user's selection, sort order and search filter
//! - **FolderList**: the derived, render-ready view of a store

mod folder;
mod snapshot;
mod store;


pub use folder::{Folder, FolderKind, FolderList};
pub use snapshot::{normalize_tag_name, SnapshotBuilder, TagSnapshot};
pub use store::{MergeOutcome, PruneOutcome, Selection, SortOrder, TagStore, ALL_FOLDER};
