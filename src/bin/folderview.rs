//! folderview CLI: run the sync engine against a saved host page.
//!
//! Usage:
//!   folderview sync --page page.json [--db path] [--config path]
//!   folderview cleanup --page page.json [--force]
//!   folderview show [--db path]
//!   folderview select <tag> --page page.json

use clap::{Parser, Subcommand};
use folderview::{
    FixturePage, FolderList, FolderSync, FolderViewConfig, OpenStore, PersistedState,
    RecordingPresenter, Selection, SqliteStateStore, StateStore, SyncHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folderview", version, about = "Tag folders for the n8n workflow list")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract tags from a page fixture and merge them into the saved state
    Sync {
        /// JSON page fixture
        #[arg(long)]
        page: PathBuf,
    },
    /// Remove saved tags that no longer appear on the page
    Cleanup {
        #[arg(long)]
        page: PathBuf,
        /// Run even if the state was synced within the last day
        #[arg(long)]
        force: bool,
    },
    /// Print the saved folder list
    Show,
    /// Select a folder and report what was clicked on the page
    Select {
        /// Tag name, or "All"
        tag: String,
        #[arg(long)]
        page: PathBuf,
    },
}

/// Get the default database path (~/.local/share/folderview/folderview.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let dir = data_dir.join("folderview");
    std::fs::create_dir_all(&dir).ok();
    dir.join("folderview.db")
}

fn load_config(path: Option<&Path>) -> Result<FolderViewConfig, String> {
    match path {
        Some(path) => FolderViewConfig::from_path(path)
            .map_err(|e| format!("Failed to load config '{}': {}", path.display(), e)),
        None => Ok(FolderViewConfig::default()),
    }
}

fn open_storage(db: Option<PathBuf>) -> Result<Arc<SqliteStateStore>, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStateStore::open(&db_path)
        .map(Arc::new)
        .map_err(|e| format!("Failed to open database: {}", e))
}

fn print_folders(list: &FolderList) {
    println!("sort: {}", list.sort_order);
    for folder in &list.folders {
        let marker = if folder.active { "*" } else { " " };
        println!("{} {} ({})", marker, folder.name, folder.count);
    }
}

struct Session {
    engine: FolderSync,
    handle: SyncHandle,
}

impl Session {
    /// Start an engine on a page fixture and wait for startup to finish.
    async fn start(
        page: &Path,
        config: FolderViewConfig,
        storage: Arc<SqliteStateStore>,
    ) -> Result<Self, String> {
        let page = FixturePage::from_json_file(page)
            .map_err(|e| format!("Failed to load page '{}': {}", page.display(), e))?;
        // Startup retries forever when the sidebar is missing; bound it here.
        let limit = config.timing.sidebar_wait() * 2 + Duration::from_secs(30);
        let engine = FolderSync::new(Arc::new(page), config)
            .with_storage(storage)
            .with_presenter(Arc::new(RecordingPresenter::new()));
        let handle = engine.start().map_err(|e| e.to_string())?;
        match tokio::time::timeout(limit, handle.state()).await {
            Ok(Ok(_)) => Ok(Self { engine, handle }),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("Timed out waiting for the page; is the sidebar present?".into()),
        }
    }

    async fn finish(self) -> Result<FolderList, String> {
        self.handle.settle().await.map_err(|e| e.to_string())?;
        let state = self.handle.state().await.map_err(|e| e.to_string())?;
        self.handle.shutdown().map_err(|e| e.to_string())?;
        self.engine.join().await;
        Ok(state.folders)
    }
}

async fn cmd_sync(page: &Path, config: FolderViewConfig, db: Option<PathBuf>) -> Result<(), String> {
    let storage = open_storage(db)?;
    let session = Session::start(page, config, storage).await?;
    let folders = session.finish().await?;
    print_folders(&folders);
    Ok(())
}

async fn cmd_cleanup(
    page: &Path,
    force: bool,
    config: FolderViewConfig,
    db: Option<PathBuf>,
) -> Result<(), String> {
    let storage = open_storage(db)?;
    let session = Session::start(page, config, storage).await?;
    let removed = session
        .handle
        .cleanup(force)
        .await
        .map_err(|e| e.to_string())?;
    println!("Removed {} tag(s)", removed);
    let folders = session.finish().await?;
    print_folders(&folders);
    Ok(())
}

fn cmd_show(config: FolderViewConfig, db: Option<PathBuf>) -> Result<(), String> {
    let storage = open_storage(db)?;
    let state = storage
        .load(&config.storage_key)
        .map_err(|e| format!("Failed to load state: {}", e))?;
    match state {
        Some(state) => {
            let store = state.restore();
            if let Some(at) = store.last_sync() {
                println!("last sync: {}", at.to_rfc3339());
            }
            print_folders(&FolderList::build(&store));
        }
        None => {
            println!("No saved state under '{}'", config.storage_key);
            print_folders(&FolderList::build(&PersistedState::default().restore()));
        }
    }
    Ok(())
}

async fn cmd_select(
    tag: &str,
    page: &Path,
    config: FolderViewConfig,
    db: Option<PathBuf>,
) -> Result<(), String> {
    let storage = open_storage(db)?;
    let session = Session::start(page, config, storage).await?;
    // Finish whatever startup navigation was restored before ours.
    session.handle.settle().await.map_err(|e| e.to_string())?;
    session
        .handle
        .select(Selection::from(tag.to_string()))
        .map_err(|e| e.to_string())?;
    let outcome = session.handle.settle().await.map_err(|e| e.to_string())?;
    match outcome {
        Some(outcome) => println!("Navigation: {:?}", outcome),
        None => println!("Navigation: none"),
    }
    let folders = session.finish().await?;
    print_folders(&folders);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folderview=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Sync { page } => cmd_sync(&page, config, cli.db).await,
        Commands::Cleanup { page, force } => cmd_cleanup(&page, force, config, cli.db).await,
        Commands::Show => cmd_show(config, cli.db),
        Commands::Select { tag, page } => cmd_select(&tag, &page, config, cli.db).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
