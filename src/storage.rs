use crate::error::StorageError;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A single named durable slot holding the serialized cache.
///
/// Implementations report failures; deciding what a failure means is left to
/// [`crate::CacheStore`], which never lets one reach a caller.
pub trait CacheStorage: Send + Sync {
    /// Name of the slot, for logs.
    fn slot_name(&self) -> &str;

    /// Returns the stored payload, or `None` when the slot has never been written.
    fn read_slot(&self) -> Result<Option<String>, StorageError>;

    /// Replaces the stored payload.
    fn write_slot(&self, payload: &str) -> Result<(), StorageError>;
}

/// Stores the slot as `<dir>/<slot>.json`.
///
/// Writes are synchronous and rewrite the whole file. [`crate::CacheStore`]
/// issues them outside its record lock, so only concurrent writers queue
/// behind a slow disk.
pub struct FileStorage {
    slot: String,
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        let path = dir.as_ref().join(format!("{slot}.json"));
        Self { slot, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStorage for FileStorage {
    fn slot_name(&self) -> &str {
        &self.slot
    }

    fn read_slot(&self) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_slot(&self, payload: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // A crash mid-write must leave either the old payload or the new one.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, payload)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// Keeps the slot in process memory; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    slot: String,
    payload: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new(slot: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            payload: Mutex::new(None),
        }
    }

    /// Seeds the slot, as if a previous session had persisted `payload`.
    pub fn with_payload(slot: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            payload: Mutex::new(Some(payload.into())),
        }
    }

    pub fn payload(&self) -> Option<String> {
        self.payload.lock().clone()
    }
}

impl CacheStorage for MemoryStorage {
    fn slot_name(&self) -> &str {
        &self.slot
    }

    fn read_slot(&self) -> Result<Option<String>, StorageError> {
        Ok(self.payload.lock().clone())
    }

    fn write_slot(&self, payload: &str) -> Result<(), StorageError> {
        *self.payload.lock() = Some(payload.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_slot_missing_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "dictionary-cache");
        assert!(storage.read_slot().unwrap().is_none());
    }

    #[test]
    fn file_slot_creates_directories_and_replaces_payload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/state"), "dictionary-cache");
        storage.write_slot("{\"a\":1}").unwrap();
        storage.write_slot("{}").unwrap();
        assert_eq!(storage.read_slot().unwrap().as_deref(), Some("{}"));
        assert!(storage.path().ends_with("dictionary-cache.json"));
        assert!(!storage.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn memory_slot_round_trips() {
        let storage = MemoryStorage::new("slot");
        assert!(storage.read_slot().unwrap().is_none());
        storage.write_slot("payload").unwrap();
        assert_eq!(storage.payload().as_deref(), Some("payload"));
    }
}
