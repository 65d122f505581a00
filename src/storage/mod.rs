//! Persistence for the folder view state
//!
//! State is stored through the `StateStore` trait as one JSON record under a
//! fixed namespace key. `SqliteStateStore` is the durable backend;
//! `MemoryStateStore` keeps everything in process.

mod memory;
mod sqlite;
mod state;
mod traits;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use state::PersistedState;
pub use traits::{OpenStore, StateStore, StorageError, StorageResult};
