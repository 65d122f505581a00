//! Storage trait definitions

use super::state::PersistedState;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key-value storage for the folder view state.
///
/// Implementations must be thread-safe (Send + Sync); the engine holds the
/// store behind an `Arc` and writes from its own task.
pub trait StateStore: Send + Sync {
    /// Load the record stored under `key`, or `None` if nothing was saved.
    fn load(&self, key: &str) -> StorageResult<Option<PersistedState>>;

    /// Replace the record stored under `key`.
    fn save(&self, key: &str, state: &PersistedState) -> StorageResult<()>;

    /// Delete the record stored under `key`. Returns true if one existed.
    fn clear(&self, key: &str) -> StorageResult<bool>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: StateStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
