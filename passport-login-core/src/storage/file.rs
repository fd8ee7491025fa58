use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use super::{SnapshotStorage, StorageError, StorageResult};

/// Snapshot storage backed by a single file.
///
/// Writes go to a temporary sibling which is then renamed over the snapshot, so a crash mid-write
/// leaves the previous snapshot in place.
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    path: PathBuf,
}

impl FileSnapshotStorage {
    /// Stores the snapshot at `path`. The parent directory is created on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn read(&self) -> StorageResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Read(format!(
                "{}: {err}",
                self.path.display()
            ))),
        }
    }

    fn write_atomic(&self, snapshot: &str) -> StorageResult<()> {
        let write_error =
            |err: std::io::Error| StorageError::Write(format!("{}: {err}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_error)?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).map_err(write_error)?;
        file.write_all(snapshot.as_bytes()).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(write_error)
    }

    fn clear(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Delete(format!(
                "{}: {err}",
                self.path.display()
            ))),
        }
    }
}
