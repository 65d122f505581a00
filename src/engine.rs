//! The sync engine: a single task that owns the tag store
//!
//! Every mutation of the [`TagStore`] happens inside one actor task fed by
//! a command channel, so merges, cleanups and user actions never
//! interleave. [`SyncHandle`] is the cheap, cloneable front door.
//!
//! Startup runs inside the actor as well:
//!
//! 1. wait for the host sidebar (retrying the whole startup on failure)
//! 2. mount the view and show the loading indicator
//! 3. hydrate the store from storage
//! 4. force a cleanup if the store has gone unsynced for a week
//! 5. first reconciliation pass, then hide the loading indicator
//! 6. restore the saved selection (or default to "All")
//! 7. start the change observer

use crate::cleanup::{CleanupReport, CleanupScheduler};
use crate::clock::{Clock, SystemClock};
use crate::config::FolderViewConfig;
use crate::extract::{Extraction, TagExtractor, TagSource};
use crate::host::{first_match, wait_until, ElementId, HostPage};
use crate::navigate::{NavigationBridge, NavigationOutcome, Navigator};
use crate::observer::{ChangeObserver, MutationBatch};
use crate::present::{LoadingGate, Presenter, TracingPresenter};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::storage::{MemoryStateStore, StateStore};
use crate::tags::{FolderList, Selection, SortOrder, TagStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("host sidebar not found within {waited_ms} ms")]
    SidebarNotFound { waited_ms: u64 },

    #[error("sync engine already started")]
    AlreadyRunning,

    #[error("sync engine has stopped")]
    ChannelClosed,
}

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Commands and handle
// ============================================================================

/// Requests processed by the engine task, in order.
#[derive(Debug)]
pub enum Command {
    /// Extract and merge (the observer sends this).
    Reconcile,
    Select(Selection),
    RemoveTag(String),
    SetSortOrder(SortOrder),
    SetSearchFilter(String),
    Cleanup {
        force: bool,
        reply: oneshot::Sender<usize>,
    },
    State(oneshot::Sender<EngineState>),
    /// Wait for the in-flight navigation, if any, and report its outcome.
    Settle(oneshot::Sender<Option<NavigationOutcome>>),
    Shutdown,
}

/// A point-in-time copy of what the engine holds.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub store: TagStore,
    pub folders: FolderList,
    /// Reconciliation passes run so far
    pub passes: u32,
    /// Where the host binding should subscribe for mutations
    pub observe_root: Option<ElementId>,
}

#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<Command>,
    mutations: mpsc::UnboundedSender<MutationBatch>,
}

impl SyncHandle {
    fn send(&self, command: Command) -> EngineResult<()> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::ChannelClosed)
    }

    async fn ask<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> EngineResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub fn reconcile(&self) -> EngineResult<()> {
        self.send(Command::Reconcile)
    }

    /// Select a folder. Persisted and re-rendered immediately; the host
    /// page is driven in the background.
    pub fn select(&self, selection: Selection) -> EngineResult<()> {
        self.send(Command::Select(selection))
    }

    pub fn remove_tag(&self, name: impl Into<String>) -> EngineResult<()> {
        self.send(Command::RemoveTag(name.into()))
    }

    pub fn set_sort_order(&self, order: SortOrder) -> EngineResult<()> {
        self.send(Command::SetSortOrder(order))
    }

    pub fn set_search_filter(&self, filter: impl Into<String>) -> EngineResult<()> {
        self.send(Command::SetSearchFilter(filter.into()))
    }

    /// Run a cleanup and return how many tags it removed.
    pub async fn cleanup(&self, force: bool) -> EngineResult<usize> {
        self.ask(|reply| Command::Cleanup { force, reply }).await
    }

    /// Waits until startup has finished.
    pub async fn state(&self) -> EngineResult<EngineState> {
        self.ask(Command::State).await
    }

    pub async fn settle(&self) -> EngineResult<Option<NavigationOutcome>> {
        self.ask(Command::Settle).await
    }

    /// Forward a batch of host DOM mutations to the change observer.
    pub fn notify_mutations(&self, batch: MutationBatch) -> EngineResult<()> {
        self.mutations
            .send(batch)
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub fn shutdown(&self) -> EngineResult<()> {
        self.send(Command::Shutdown)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Assembles the collaborators and starts the engine task.
pub struct FolderSync {
    config: FolderViewConfig,
    page: Arc<dyn HostPage>,
    source: Arc<dyn TagSource>,
    navigator: Arc<dyn Navigator>,
    presenter: Arc<dyn Presenter>,
    storage: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FolderSync {
    /// An engine reading and driving `page`, with in-memory storage and a
    /// presenter that only logs.
    pub fn new(page: Arc<dyn HostPage>, config: FolderViewConfig) -> Self {
        Self {
            source: Arc::new(TagExtractor::new(page.clone(), &config)),
            navigator: Arc::new(NavigationBridge::new(page.clone(), &config)),
            presenter: Arc::new(TracingPresenter),
            storage: Arc::new(MemoryStateStore::new()),
            clock: Arc::new(SystemClock),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
            page,
            config,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn TagSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StateStore>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FolderViewConfig {
        &self.config
    }

    /// Spawn the engine task. Only the first call does anything; later
    /// calls return [`EngineError::AlreadyRunning`].
    pub fn start(&self) -> EngineResult<SyncHandle> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("start called again, ignoring");
            return Err(EngineError::AlreadyRunning);
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (mutation_tx, mutation_rx) = mpsc::unbounded_channel();
        let gate = Arc::new(LoadingGate::new());

        let actor = Actor {
            reconciler: Reconciler::new(
                self.presenter.clone(),
                self.storage.clone(),
                self.config.storage_key.clone(),
                gate,
            ),
            scheduler: CleanupScheduler::new(&self.config.timing),
            observer: Some((ChangeObserver::new(self.page.clone(), &self.config), mutation_rx)),
            observer_task: None,
            observe_root: None,
            self_tx: command_tx.downgrade(),
            config: self.config.clone(),
            page: self.page.clone(),
            source: self.source.clone(),
            navigator: self.navigator.clone(),
            presenter: self.presenter.clone(),
            clock: self.clock.clone(),
            store: TagStore::new(),
            mounted: false,
            hydrated: false,
            navigation: None,
            last_navigation: None,
        };
        let task = tokio::spawn(actor.run(command_rx));
        if let Ok(mut slot) = self.task.lock() {
            *slot = Some(task);
        }

        Ok(SyncHandle {
            commands: command_tx,
            mutations: mutation_tx,
        })
    }

    /// Wait for the engine task to finish (after [`SyncHandle::shutdown`]
    /// or once every handle is dropped).
    pub async fn join(&self) {
        let task = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "sync engine task failed");
            }
        }
    }
}

struct Actor {
    config: FolderViewConfig,
    page: Arc<dyn HostPage>,
    source: Arc<dyn TagSource>,
    navigator: Arc<dyn Navigator>,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
    reconciler: Reconciler,
    scheduler: CleanupScheduler,
    store: TagStore,
    mounted: bool,
    hydrated: bool,
    navigation: Option<JoinHandle<NavigationOutcome>>,
    last_navigation: Option<NavigationOutcome>,
    observer: Option<(ChangeObserver, mpsc::UnboundedReceiver<MutationBatch>)>,
    observer_task: Option<JoinHandle<()>>,
    observe_root: Option<ElementId>,
    /// Weak so that dropping every handle still stops the engine
    self_tx: mpsc::WeakUnboundedSender<Command>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut pending = VecDeque::new();
        loop {
            match self.initialize().await {
                Ok(()) => break,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        retry_ms = self.config.timing.init_retry_ms,
                        "initialization failed, retrying"
                    );
                }
            }
            let retry = tokio::time::sleep(self.config.timing.init_retry());
            tokio::pin!(retry);
            loop {
                tokio::select! {
                    _ = &mut retry => break,
                    command = commands.recv() => match command {
                        None | Some(Command::Shutdown) => {
                            self.stop();
                            return;
                        }
                        Some(command) => pending.push_back(command),
                    },
                }
            }
        }

        for command in pending {
            if !self.handle(command).await {
                self.stop();
                return;
            }
        }
        while let Some(command) = commands.recv().await {
            if !self.handle(command).await {
                break;
            }
        }
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.observer_task.take() {
            task.abort();
        }
        if let Some(task) = self.navigation.take() {
            task.abort();
        }
        tracing::debug!("sync engine stopped");
    }

    // === Startup ===

    async fn initialize(&mut self) -> EngineResult<()> {
        let sidebar = self.find_sidebar().await?;

        if !self.mounted {
            self.presenter.mount(sidebar);
            self.reconciler.gate().show(self.presenter.as_ref());
            self.spawn_loading_timer();
            self.mounted = true;
        }

        if !self.hydrated {
            self.store = self.reconciler.hydrate();
            self.hydrated = true;
            if !self.store.is_empty() {
                self.reconciler.render(&self.store);
            }
        }

        if self.scheduler.due_at_startup(&self.store, self.clock.now()) {
            tracing::info!(last_sync = ?self.store.last_sync(), "folder state is over a week old, forcing cleanup");
            self.run_cleanup(true, None).await;
        }

        let report = self.reconcile_pass().await;
        if report == ReconcileReport::Skipped {
            tracing::warn!("no tags found on the host page");
            if !self.reconciler.gate().has_rendered() {
                self.reconciler.render(&self.store);
            }
        }
        self.reconciler.gate().hide(self.presenter.as_ref());

        self.restore_selection();
        self.start_observer();

        tracing::info!(tags = self.store.len(), "folder view initialized");
        Ok(())
    }

    async fn find_sidebar(&self) -> EngineResult<ElementId> {
        let probes = &self.config.probes.sidebar;
        let found = wait_until(
            self.config.timing.poll_interval(),
            self.config.timing.sidebar_wait(),
            || first_match(probes, |probe| probe.locate(self.page.as_ref())),
        )
        .await;
        match found {
            Some((index, sidebar)) => {
                tracing::debug!(probe = index, %sidebar, "host sidebar found");
                Ok(sidebar)
            }
            None => Err(EngineError::SidebarNotFound {
                waited_ms: self.config.timing.sidebar_wait_ms,
            }),
        }
    }

    fn spawn_loading_timer(&self) {
        let gate = self.reconciler.gate().clone();
        let presenter = self.presenter.clone();
        let fallback = self.config.fallback_tags.clone();
        let timeout = self.config.timing.loading_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if !gate.is_loading() {
                return;
            }
            if !gate.has_rendered() && !fallback.is_empty() {
                tracing::warn!(tags = fallback.len(), "nothing extracted yet, showing fallback tags");
                let store = TagStore::from_parts(fallback, None, SortOrder::default(), None);
                presenter.render(&FolderList::build(&store));
                gate.mark_fallback();
            }
            if gate.hide(presenter.as_ref()) {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "loading indicator force-hidden");
            }
        });
    }

    fn restore_selection(&mut self) {
        match self.store.selected().cloned() {
            Some(selection) => {
                let exists = match &selection {
                    Selection::All => true,
                    Selection::Tag(name) => self.store.contains(name),
                };
                if exists {
                    tracing::debug!(selection = selection.as_str(), "restoring saved selection");
                    self.navigate(selection);
                } else {
                    tracing::debug!(
                        selection = selection.as_str(),
                        "saved selection no longer exists"
                    );
                }
            }
            None => {
                self.store.select(Selection::All);
                self.reconciler.persist(&self.store);
                if !self.reconciler.gate().showing_fallback() {
                    self.reconciler.render(&self.store);
                }
            }
        }
    }

    fn start_observer(&mut self) {
        let Some((observer, batches)) = self.observer.take() else {
            return;
        };
        self.observe_root = observer.locate_root();
        match self.observe_root {
            Some(root) => tracing::debug!(%root, "observing workflow list"),
            None => tracing::debug!("workflow list container not found, observer idle until mutations arrive"),
        }
        let tx = self.self_tx.clone();
        self.observer_task = Some(observer.spawn(batches, move || {
            tx.upgrade()
                .is_some_and(|tx| tx.send(Command::Reconcile).is_ok())
        }));
    }

    // === Passes ===

    async fn reconcile_pass(&mut self) -> ReconcileReport {
        let extraction = self.source.extract().await;
        let report = self
            .reconciler
            .apply(&mut self.store, &extraction, self.clock.now());
        if self.scheduler.tick() {
            tracing::debug!(pass = self.scheduler.passes(), "scheduled cleanup");
            let truth = match extraction {
                Extraction::Complete(_) => Some(extraction),
                Extraction::Exhausted { .. } => None,
            };
            self.run_cleanup(false, truth).await;
        }
        report
    }

    /// On the workflow list with no host filter applied.
    fn reading_full_list(&self) -> bool {
        let location = self.page.location();
        if location.is_unfiltered(&self.config.routes.workflow_list) {
            return true;
        }
        tracing::debug!(%location, "host list is filtered, cleanup skipped");
        false
    }

    /// Prune against `truth` when given, otherwise against a fresh
    /// extraction. A filtered host list is never ground truth.
    async fn run_cleanup(&mut self, force: bool, truth: Option<Extraction>) -> CleanupReport {
        let report = self.cleanup_report(force, truth).await;
        if report.touched_store() {
            self.reconciler.persist(&self.store);
            self.reconciler.render(&self.store);
        }
        if report.selection_reset() {
            self.navigate(Selection::All);
        }
        report
    }

    async fn cleanup_report(&mut self, force: bool, truth: Option<Extraction>) -> CleanupReport {
        if !self.scheduler.is_due(&self.store, force, self.clock.now()) {
            tracing::debug!(last_sync = ?self.store.last_sync(), "cleanup not due");
            return CleanupReport::NotDue;
        }
        if !self.reading_full_list() {
            return CleanupReport::Inconclusive;
        }
        let truth = match truth {
            Some(truth) => truth,
            None => {
                let fresh = self.source.extract().await;
                // The user may have filtered the list while it was being read.
                if !self.reading_full_list() {
                    return CleanupReport::Inconclusive;
                }
                fresh
            }
        };
        self.scheduler.prune(&mut self.store, &truth, self.clock.now())
    }

    fn navigate(&mut self, selection: Selection) {
        if let Some(previous) = self.navigation.take() {
            previous.abort();
        }
        let navigator = self.navigator.clone();
        self.navigation = Some(tokio::spawn(async move {
            let outcome = navigator.select(&selection).await;
            tracing::debug!(selection = selection.as_str(), ?outcome, "navigation finished");
            outcome
        }));
    }

    // === Commands ===

    /// Returns false when the engine should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Reconcile => {
                self.reconcile_pass().await;
            }
            Command::Select(selection) => {
                self.store.select(selection.clone());
                self.reconciler.persist(&self.store);
                self.reconciler.render(&self.store);
                self.navigate(selection);
            }
            Command::RemoveTag(name) => match self.store.remove_tag(&name) {
                Some(outcome) => {
                    tracing::info!(tag = %name, "tag removed");
                    self.reconciler.persist(&self.store);
                    self.reconciler.render(&self.store);
                    if outcome.selection_reset {
                        self.navigate(Selection::All);
                    }
                }
                None => tracing::debug!(tag = %name, "remove requested for unknown tag"),
            },
            Command::SetSortOrder(order) => {
                self.store.set_sort_order(order);
                self.reconciler.persist(&self.store);
                self.reconciler.render(&self.store);
            }
            Command::SetSearchFilter(filter) => {
                self.store.set_search_filter(filter);
                self.reconciler.render(&self.store);
            }
            Command::Cleanup { force, reply } => {
                let report = self.run_cleanup(force, None).await;
                let _ = reply.send(report.removed_count());
            }
            Command::State(reply) => {
                let _ = reply.send(EngineState {
                    folders: FolderList::build(&self.store),
                    store: self.store.clone(),
                    passes: self.scheduler.passes(),
                    observe_root: self.observe_root,
                });
            }
            Command::Settle(reply) => {
                if let Some(task) = self.navigation.take() {
                    match task.await {
                        Ok(outcome) => self.last_navigation = Some(outcome),
                        Err(e) if e.is_cancelled() => {}
                        Err(e) => tracing::error!(error = %e, "navigation task failed"),
                    }
                }
                let _ = reply.send(self.last_navigation.clone());
            }
            Command::Shutdown => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FixtureNode, FixturePage};
    use crate::present::RecordingPresenter;

    fn page() -> Arc<FixturePage> {
        Arc::new(FixturePage::new(
            FixtureNode::new("body")
                .with_child(FixtureNode::new("nav").with_id("sidebar"))
                .with_child(
                    FixtureNode::new("div")
                        .with_attr("data-test-id", "workflows-list-item")
                        .with_child(
                            FixtureNode::new("li")
                                .with_attr("data-test-id", "tag")
                                .with_child(FixtureNode::new("span").with_text("foo")),
                        ),
                ),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_rejected_without_side_effects() {
        let presenter = Arc::new(RecordingPresenter::new());
        let engine = FolderSync::new(page(), FolderViewConfig::default())
            .with_presenter(presenter.clone());

        let handle = engine.start().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));

        let state = handle.state().await.unwrap();
        assert_eq!(state.store.count("foo"), Some(1));
        assert_eq!(presenter.recorded().mounts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handles_stop_the_engine() {
        let engine = FolderSync::new(page(), FolderViewConfig::default());
        let handle = engine.start().unwrap();
        handle.state().await.unwrap();
        drop(handle);
        engine.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_shutdown_fail() {
        let engine = FolderSync::new(page(), FolderViewConfig::default());
        let handle = engine.start().unwrap();
        handle.shutdown().unwrap();
        engine.join().await;
        assert!(matches!(handle.state().await, Err(EngineError::ChannelClosed)));
    }
}
