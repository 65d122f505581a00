//! Presentation seam
//!
//! The folder view's markup is owned by whoever implements [`Presenter`].
//! The engine only hands over complete [`FolderList`]s (every render is a
//! full replace) and toggles the loading indicator.

use crate::host::ElementId;
use crate::tags::FolderList;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub trait Presenter: Send + Sync {
    /// Insert the folder view container next to the host sidebar.
    /// Called once per engine, however many times startup retries.
    fn mount(&self, sidebar: ElementId);

    /// Replace the rendered list.
    fn render(&self, list: &FolderList);

    fn set_loading(&self, loading: bool);
}

/// Logs renders instead of drawing them.
#[derive(Debug, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn mount(&self, sidebar: ElementId) {
        tracing::info!(%sidebar, "folder view mounted");
    }

    fn render(&self, list: &FolderList) {
        let folders: Vec<String> = list
            .folders
            .iter()
            .map(|f| format!("{}({}){}", f.name, f.count, if f.active { "*" } else { "" }))
            .collect();
        tracing::info!(
            sort = %list.sort_order,
            search = %list.search_filter,
            folders = %folders.join(", "),
            "folder list rendered"
        );
    }

    fn set_loading(&self, loading: bool) {
        tracing::debug!(loading, "loading indicator");
    }
}

/// Keeps every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    inner: Mutex<Recorded>,
}

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub mounts: Vec<ElementId>,
    pub renders: Vec<FolderList>,
    pub loading: Vec<bool>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn recorded(&self) -> Recorded {
        self.with(|r| r.clone())
    }

    pub fn last_render(&self) -> Option<FolderList> {
        self.with(|r| r.renders.last().cloned())
    }

    pub fn render_count(&self) -> usize {
        self.with(|r| r.renders.len())
    }

    /// Current state of the loading indicator.
    pub fn is_loading(&self) -> bool {
        self.with(|r| r.loading.last().copied().unwrap_or(false))
    }
}

impl Presenter for RecordingPresenter {
    fn mount(&self, sidebar: ElementId) {
        self.with(|r| r.mounts.push(sidebar));
    }

    fn render(&self, list: &FolderList) {
        self.with(|r| r.renders.push(list.clone()));
    }

    fn set_loading(&self, loading: bool) {
        self.with(|r| r.loading.push(loading));
    }
}

/// Shared between the engine and its loading safety timer.
///
/// Whichever side finishes first hides the indicator; the other becomes a
/// no-op.
#[derive(Debug, Default)]
pub struct LoadingGate {
    loading: AtomicBool,
    rendered: AtomicBool,
    fallback: AtomicBool,
}

impl LoadingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, presenter: &dyn Presenter) {
        self.loading.store(true, Ordering::SeqCst);
        presenter.set_loading(true);
    }

    /// Hide the indicator. Returns false if it was already hidden.
    pub fn hide(&self, presenter: &dyn Presenter) -> bool {
        let was_loading = self.loading.swap(false, Ordering::SeqCst);
        if was_loading {
            presenter.set_loading(false);
        }
        was_loading
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// A real folder list was rendered; it replaces any fallback list.
    pub fn mark_rendered(&self) {
        self.rendered.store(true, Ordering::SeqCst);
        self.fallback.store(false, Ordering::SeqCst);
    }

    /// The placeholder tags are on screen. Counts as rendered.
    pub fn mark_fallback(&self) {
        self.rendered.store(true, Ordering::SeqCst);
        self.fallback.store(true, Ordering::SeqCst);
    }

    pub fn showing_fallback(&self) -> bool {
        self.fallback.load(Ordering::SeqCst)
    }

    pub fn has_rendered(&self) -> bool {
        self.rendered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_hides_once() {
        let presenter = RecordingPresenter::new();
        let gate = LoadingGate::new();
        gate.show(&presenter);
        assert!(presenter.is_loading());

        assert!(gate.hide(&presenter));
        assert!(!gate.hide(&presenter));
        assert_eq!(presenter.recorded().loading, vec![true, false]);
    }

    #[test]
    fn real_render_replaces_fallback() {
        let gate = LoadingGate::new();
        gate.mark_fallback();
        assert!(gate.has_rendered());
        assert!(gate.showing_fallback());

        gate.mark_rendered();
        assert!(gate.has_rendered());
        assert!(!gate.showing_fallback());
    }
}
