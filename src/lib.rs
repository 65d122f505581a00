//! folderview: tag folders for the n8n workflow list
//!
//! Keeps a persistent, monotonically growing catalogue of the tags seen on
//! the host's workflow list and presents them as folders. Selecting a folder
//! drives the host's own tag filter.
//!
//! # Core Concepts
//!
//! - **TagSnapshot**: what one extraction read off the page
//! - **TagStore**: the superset of every tag seen, owned by a single task
//! - **Reconciliation**: merge a snapshot in, never removing anything
//! - **Cleanup**: prune against fresh ground truth, never on a failed read
//!
//! # Example
//!
//! ```no_run
//! use folderview::{FixtureNode, FixturePage, FolderSync, FolderViewConfig, Selection};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), folderview::EngineError> {
//! let page = Arc::new(FixturePage::new(FixtureNode::new("body")));
//! let engine = FolderSync::new(page, FolderViewConfig::default());
//! let handle = engine.start()?;
//! handle.select(Selection::Tag("billing".into()))?;
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod clock;
pub mod config;
pub mod engine;
pub mod extract;
pub mod host;
pub mod navigate;
pub mod observer;
pub mod present;
pub mod reconcile;
pub mod storage;
pub mod tags;

pub use cleanup::{CleanupReport, CleanupScheduler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FolderViewConfig, ProbeConfig, RouteConfig, TimingConfig};
pub use engine::{Command, EngineError, EngineResult, EngineState, FolderSync, SyncHandle};
pub use extract::{AttemptError, Extraction, TagExtractor, TagSource};
pub use host::{ElementId, FixtureNode, FixturePage, HostPage, Location, Rect};
pub use navigate::{NavigationBridge, NavigationOutcome, Navigator};
pub use observer::{ChangeObserver, MutationBatch};
pub use present::{LoadingGate, Presenter, RecordingPresenter, TracingPresenter};
pub use reconcile::{ReconcileReport, Reconciler};
pub use storage::{
    MemoryStateStore, OpenStore, PersistedState, SqliteStateStore, StateStore, StorageError,
    StorageResult,
};
pub use tags::{
    Folder, FolderKind, FolderList, MergeOutcome, PruneOutcome, Selection, SortOrder, TagSnapshot,
    TagStore, ALL_FOLDER,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
