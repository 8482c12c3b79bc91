//! Local persistence for collection snapshots.
//!
//! Each collection is stored as one JSON document under a short key
//! (`cart`, `wishlist`, `addresses`, `orders`, `auth-session`). Writes are
//! synchronous so a mutation is on disk before its remote call is queued.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur when reading or writing local snapshots.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key is empty or not safe to use as a file name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Filesystem failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A key/value store for serialized snapshots.
pub trait Storage: Send + Sync {
    /// Read the raw document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the key is invalid or the read fails.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the key is invalid or the write fails.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the document stored under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the key is invalid or the delete fails.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a snapshot.
///
/// # Errors
///
/// Returns `StorageError` if the read fails or the document does not decode.
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> Result<Option<T>, StorageError> {
    storage
        .read(key)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(StorageError::from)
}

/// Encode and write a snapshot.
///
/// # Errors
///
/// Returns `StorageError` if encoding or the write fails.
pub fn save_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.write(key, &raw)
}

/// Reject keys that are empty or could escape the storage directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key cannot be empty".to_string()));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
    {
        return Err(StorageError::InvalidKey(format!(
            "key contains invalid characters: {key:?}"
        )));
    }
    Ok(())
}
