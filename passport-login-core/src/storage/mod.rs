//! Persistence of the session snapshot.
//!
//! The session keeps a single slot: the encoded [`AuthState`](crate::AuthState) of the current
//! session. Backends only have to replace that slot atomically.

mod error;
mod file;
mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileSnapshotStorage;
pub use memory::MemorySnapshotStorage;

/// Backend holding the persisted snapshot.
pub trait SnapshotStorage: Send + Sync {
    /// Reads the snapshot, if one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self) -> StorageResult<Option<String>>;

    /// Replaces the snapshot. Readers observe either the previous or the new value, never a mix.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, in which case the previous snapshot is kept.
    fn write_atomic(&self, snapshot: &str) -> StorageResult<()>;

    /// Removes the snapshot. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear(&self) -> StorageResult<()>;
}
