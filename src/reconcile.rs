//! Reconciliation: fold a fresh extraction into the store, re-render, persist
//!
//! A pass never removes tags. Only a [`Extraction::Complete`] snapshot is
//! merged; an exhausted extraction leaves both the store and the rendered
//! list untouched.

use crate::extract::Extraction;
use crate::present::{LoadingGate, Presenter};
use crate::storage::{PersistedState, StateStore};
use crate::tags::{FolderList, MergeOutcome, TagStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What one reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileReport {
    Merged(MergeOutcome),
    /// Extraction ran out of attempts; nothing was merged or rendered.
    Skipped,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Merged(outcome) if outcome.changed())
    }
}

/// Owns the render and persist side effects shared by every store mutation.
pub struct Reconciler {
    presenter: Arc<dyn Presenter>,
    storage: Arc<dyn StateStore>,
    storage_key: String,
    gate: Arc<LoadingGate>,
}

impl Reconciler {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        storage: Arc<dyn StateStore>,
        storage_key: impl Into<String>,
        gate: Arc<LoadingGate>,
    ) -> Self {
        Self {
            presenter,
            storage,
            storage_key: storage_key.into(),
            gate,
        }
    }

    pub fn presenter(&self) -> &dyn Presenter {
        self.presenter.as_ref()
    }

    pub fn gate(&self) -> &Arc<LoadingGate> {
        &self.gate
    }

    pub fn apply(
        &self,
        store: &mut TagStore,
        extraction: &Extraction,
        now: DateTime<Utc>,
    ) -> ReconcileReport {
        let Some(snapshot) = extraction.snapshot() else {
            tracing::debug!("extraction exhausted, skipping merge");
            return ReconcileReport::Skipped;
        };

        let outcome = store.merge(snapshot, now);
        tracing::debug!(
            seen = snapshot.len(),
            inserted = outcome.inserted.len(),
            raised = outcome.raised.len(),
            "merged tag snapshot"
        );
        if outcome.changed() {
            self.persist(store);
        }
        self.render(store);
        ReconcileReport::Merged(outcome)
    }

    /// Rebuild the whole folder list and hand it to the presenter.
    pub fn render(&self, store: &TagStore) -> FolderList {
        let list = FolderList::build(store);
        self.presenter.render(&list);
        self.gate.mark_rendered();
        list
    }

    /// Save the store. Failures are logged and otherwise ignored.
    pub fn persist(&self, store: &TagStore) {
        let state = PersistedState::capture(store);
        if let Err(e) = self.storage.save(&self.storage_key, &state) {
            tracing::warn!(key = %self.storage_key, error = %e, "failed to persist folder state");
        }
    }

    /// Load the saved store, or an empty one when nothing usable is saved.
    pub fn hydrate(&self) -> TagStore {
        match self.storage.load(&self.storage_key) {
            Ok(Some(state)) => {
                let store = state.restore();
                tracing::info!(tags = store.len(), "restored folder state");
                store
            }
            Ok(None) => TagStore::new(),
            Err(e) => {
                tracing::warn!(key = %self.storage_key, error = %e, "failed to load folder state");
                TagStore::new()
            }
        }
    }
}
