//! Exercise persistence over a key-value blob store.
//!
//! The store holds one JSON document per key. Reads never fail from the
//! caller's point of view: a missing or unparsable blob is an empty collection,
//! and records that do not parse are skipped one by one.
//! Writes are best-effort and only logged on failure.

use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::domain::Exercise;
use crate::error::StorageError;

pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// `<root>/<key>.json` per key.
#[derive(Clone, Debug)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        check_key(key)?;
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.root)?;
        // Readers never see a half-written document.
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Load the exercise collection stored under `key`.
pub fn load_exercises(store: &dyn BlobStore, key: &str) -> Vec<Exercise> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(target: "baitap_backend", %key, "No stored exercises yet");
            return Vec::new();
        }
        Err(e) => {
            error!(target: "baitap_backend", %key, error = %e, "Failed to read exercises from store");
            return Vec::new();
        }
    };

    let records = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(target: "baitap_backend", %key, error = %e, bytes = raw.len(), "Stored exercises are corrupt; starting empty");
            return Vec::new();
        }
    };

    // Records are read one at a time; unreadable ones are skipped.
    let total = records.len();
    let list: Vec<Exercise> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<Exercise>(record) {
            Ok(exercise) => Some(exercise),
            Err(e) => {
                warn!(target: "baitap_backend", %key, index = i, error = %e, "Skipping unreadable exercise record");
                None
            }
        })
        .collect();
    debug!(target: "baitap_backend", %key, count = list.len(), skipped = total - list.len(), "Loaded exercises");
    list
}

/// Overwrite the collection stored under `key`. Failures are logged, never returned.
pub fn save_exercises(store: &dyn BlobStore, key: &str, exercises: &[Exercise]) {
    let json = match serde_json::to_string(exercises) {
        Ok(json) => json,
        Err(e) => {
            error!(target: "baitap_backend", %key, error = %e, "Failed to serialize exercises");
            return;
        }
    };
    match store.set(key, &json) {
        Ok(()) => debug!(target: "baitap_backend", %key, count = exercises.len(), bytes = json.len(), "Saved exercises"),
        Err(e) => error!(target: "baitap_backend", %key, error = %e, "Failed to save exercises to store"),
    }
}

/// In-process store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: std::sync::Mutex<std::collections::HashMap<String, String>>,
    fail_writes: bool,
}

#[cfg(test)]
impl MemoryBlobStore {
    /// Every `set` fails with an I/O error.
    pub fn failing() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.inner.lock().unwrap().insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        check_key(key)?;
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        check_key(key)?;
        if self.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into());
        }
        self.put_raw(key, value);
        Ok(())
    }
}
