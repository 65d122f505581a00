//! Change observer: turn host DOM mutations into reconciliation requests
//!
//! The host binding forwards structural mutation batches into a channel.
//! The observer drops everything that arrives during the startup delay,
//! ignores batches that touch nothing tag-like, and waits for a quiet
//! period after the last qualifying batch before asking the engine to
//! reconcile once.

use crate::config::FolderViewConfig;
use crate::host::{ElementId, HostPage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Nodes whose child lists changed in one mutation callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub targets: Vec<ElementId>,
}

impl MutationBatch {
    pub fn new(targets: impl IntoIterator<Item = ElementId>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }
}

pub struct ChangeObserver {
    page: Arc<dyn HostPage>,
    roots: Vec<String>,
    markers: Vec<String>,
    debounce: Duration,
    startup_delay: Duration,
}

impl ChangeObserver {
    pub fn new(page: Arc<dyn HostPage>, config: &FolderViewConfig) -> Self {
        Self {
            page,
            roots: config.probes.observe_root.clone(),
            markers: config.probes.observe_markers.clone(),
            debounce: config.timing.observer_debounce(),
            startup_delay: config.timing.observer_startup_delay(),
        }
    }

    /// The subtree the host binding should subscribe to, if present.
    pub fn locate_root(&self) -> Option<ElementId> {
        self.roots
            .iter()
            .find_map(|selector| self.page.query(None, selector))
    }

    /// Does any mutated node contain (or is it) a tag or workflow element?
    pub fn is_relevant(&self, batch: &MutationBatch) -> bool {
        batch.targets.iter().any(|target| {
            self.markers.iter().any(|marker| {
                self.page.closest(*target, marker) == Some(*target)
                    || self.page.query(Some(*target), marker).is_some()
            })
        })
    }

    /// Run until `batches` closes, calling `trigger` once per quiet period.
    /// `trigger` returning false stops the observer.
    pub fn spawn<F>(self, batches: mpsc::UnboundedReceiver<MutationBatch>, trigger: F) -> JoinHandle<()>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        tokio::spawn(self.run(batches, trigger))
    }

    async fn run<F>(self, mut batches: mpsc::UnboundedReceiver<MutationBatch>, mut trigger: F)
    where
        F: FnMut() -> bool + Send,
    {
        tokio::time::sleep(self.startup_delay).await;
        let mut dropped = 0usize;
        while batches.try_recv().is_ok() {
            dropped += 1;
        }
        tracing::debug!(dropped, "change observer started");

        while let Some(batch) = batches.recv().await {
            if !self.is_relevant(&batch) {
                continue;
            }

            let mut deadline = Instant::now() + self.debounce;
            let mut closed = false;
            loop {
                match tokio::time::timeout_at(deadline, batches.recv()).await {
                    Err(_) => break,
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Ok(Some(next)) => {
                        if self.is_relevant(&next) {
                            deadline = Instant::now() + self.debounce;
                        }
                    }
                }
            }

            tracing::debug!("tag-related mutations settled, requesting reconciliation");
            if !trigger() || closed {
                break;
            }
        }
        tracing::debug!("change observer stopped");
    }
}
