use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Storage, StorageError, validate_key};

/// One JSON file per key under a data directory.
///
/// Files are named `{namespace}.{key}.json`. Writes go to a hidden temp file
/// that is synced and renamed over the target, so a crash mid-write leaves
/// the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
    namespace: String,
}

impl FileStorage {
    /// Create storage rooted at `base_path`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the namespace is invalid or the directory
    /// cannot be created.
    pub fn new(base_path: impl Into<PathBuf>, namespace: &str) -> Result<Self, StorageError> {
        validate_key(namespace)?;
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            namespace: namespace.to_string(),
        })
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self
            .base_path
            .join(format!("{}.{key}.json", self.namespace)))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp_path = self.base_path.join(format!(
            ".{}.{key}.{}.tmp",
            self.namespace,
            uuid::Uuid::new_v4().simple()
        ));

        let write_result = (|| {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
            drop(file);
            match std::fs::rename(&tmp_path, &path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    std::fs::remove_file(&path)?;
                    std::fs::rename(&tmp_path, &path)?;
                }
                Err(e) => return Err(e),
            }
            Ok::<(), std::io::Error>(())
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StorageError::Io(e));
        }
        debug!(key, bytes = value.len(), "Snapshot written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
