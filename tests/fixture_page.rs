//! The engine driving a saved page fixture through the real navigation bridge
//!
//! Run with: `cargo test --test fixture_page`

use folderview::{
    FixturePage, FolderSync, FolderViewConfig, HostPage, NavigationOutcome, RecordingPresenter,
    Selection,
};
use std::path::PathBuf;
use std::sync::Arc;

fn demo_page() -> Arc<FixturePage> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/workflows.json");
    Arc::new(FixturePage::from_json_file(path).unwrap())
}

#[tokio::test(start_paused = true)]
async fn demo_fixture_renders_folders() {
    let page = demo_page();
    let presenter = Arc::new(RecordingPresenter::new());
    let engine = FolderSync::new(page.clone(), FolderViewConfig::default())
        .with_presenter(presenter.clone());
    let handle = engine.start().unwrap();

    let state = handle.state().await.unwrap();
    let rendered: Vec<(&str, u64)> = state
        .folders
        .folders
        .iter()
        .map(|f| (f.name.as_str(), f.count))
        .collect();
    assert_eq!(rendered, vec![("All", 3), ("billing", 1), ("ops", 2)]);
    assert_eq!(presenter.recorded().mounts.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn selecting_a_tag_clears_filters_then_clicks_its_chip() {
    let page = demo_page();
    let engine = FolderSync::new(page.clone(), FolderViewConfig::default());
    let handle = engine.start().unwrap();
    handle.state().await.unwrap();

    handle.select(Selection::Tag("billing".into())).unwrap();
    let outcome = handle.settle().await.unwrap();

    assert_eq!(outcome, Some(NavigationOutcome::ChipClicked { probe: 0 }));
    assert_eq!(page.location().to_string(), "/home/workflows?tags=billing");

    handle.select(Selection::All).unwrap();
    let outcome = handle.settle().await.unwrap();
    assert_eq!(outcome, Some(NavigationOutcome::ResetClicked));
    assert!(page.location().is_unfiltered("/home/workflows"));
}

#[tokio::test(start_paused = true)]
async fn selection_off_the_workflow_list_does_nothing() {
    let page = demo_page();
    let engine = FolderSync::new(page.clone(), FolderViewConfig::default());
    let handle = engine.start().unwrap();
    handle.state().await.unwrap();

    page.set_url("/workflow/12");
    handle.select(Selection::Tag("ops".into())).unwrap();

    assert_eq!(
        handle.settle().await.unwrap(),
        Some(NavigationOutcome::OffRoute)
    );
    assert_eq!(page.location().path, "/workflow/12");
}
