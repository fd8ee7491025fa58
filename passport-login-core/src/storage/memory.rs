use std::sync::Mutex;

use super::{SnapshotStorage, StorageError, StorageResult};

/// Snapshot storage that lives as long as the process. Used by hosts without durable storage and
/// by tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStorage {
    slot: Mutex<Option<String>>,
}

impl MemorySnapshotStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage already holding `snapshot`.
    #[must_use]
    pub fn with_snapshot(snapshot: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot.into())),
        }
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn read(&self) -> StorageResult<Option<String>> {
        let guard = self
            .slot
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn write_atomic(&self, snapshot: &str) -> StorageResult<()> {
        *self
            .slot
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))? =
            Some(snapshot.to_string());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.slot
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))?
            .take();
        Ok(())
    }
}
