//! In-process storage backend

use super::state::PersistedState;
use super::traits::{StateStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Keeps records in a process-local map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, PersistedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a record, as if a previous session had saved it.
    pub fn with_record(self, key: impl Into<String>, state: PersistedState) -> Self {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key.into(), state);
        }
        self
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> StorageResult<Option<PersistedState>> {
        let records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn save(&self, key: &str, state: &PersistedState) -> StorageResult<()> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        records.insert(key.to_string(), state.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> StorageResult<bool> {
        let mut records = self.records.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(records.remove(key).is_some())
    }
}
