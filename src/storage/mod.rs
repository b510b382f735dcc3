pub mod json_dir;
pub mod memory;

pub use json_dir::JsonDirStore;
pub use memory::{FailureSwitch, MemoryStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures of the underlying key-value engine
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// The engine refused the write, e.g. quota exceeded
    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

/// Logical partitions of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Key = campaign id, value = full campaign record
    Campaigns,
    /// Single fixed key holding the settings record
    Settings,
    /// Key = blob key, value = raw media bytes
    Media,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Campaigns, Namespace::Settings, Namespace::Media];

    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Campaigns => "campaigns",
            Namespace::Settings => "settings",
            Namespace::Media => "media",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key-value object store backing campaigns, settings and media blobs
///
/// Implementations:
/// - `JsonDirStore`: one file per record under a data directory
/// - `MemoryStore`: in-memory, with write-failure injection for testing
pub trait KeyValueStore: Send {
    /// All records of a namespace, in no particular order
    fn get_all(&self, ns: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// One record, or None if absent
    fn get(&self, ns: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Insert or replace a record
    fn put(&mut self, ns: Namespace, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Remove a record. Removing an absent key is not an error.
    fn delete(&mut self, ns: Namespace, key: &str) -> StorageResult<()>;
}

/// Store handle shared by the campaign and settings services
pub type SharedStore = Arc<Mutex<dyn KeyValueStore>>;

/// Wrap a store for sharing between services
pub fn shared<S: KeyValueStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Keys end up as file names, so they are restricted to a safe alphabet
pub fn validate_key(key: &str) -> StorageResult<()> {
    let ok = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Serialize and upsert a record
pub fn put_record<T: Serialize>(
    store: &mut dyn KeyValueStore,
    ns: Namespace,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(ns, key, &bytes)
}

/// Read and deserialize one record. A record that fails to parse reads as absent.
pub fn get_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    ns: Namespace,
    key: &str,
) -> StorageResult<Option<T>> {
    let Some(bytes) = store.get(ns, key)? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Dropping unreadable {} record {:?}: {}", ns, key, e);
            Ok(None)
        }
    }
}

/// Read every record of a namespace, silently dropping those that fail to parse
/// or fail the `keep` check. `keep` sees the key the record is stored under.
pub fn load_records<T, F>(store: &dyn KeyValueStore, ns: Namespace, keep: F) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&str, &T) -> bool,
{
    let mut records = Vec::new();
    for (key, bytes) in store.get_all(ns)? {
        match serde_json::from_slice::<T>(&bytes) {
            Ok(record) if keep(&key, &record) => records.push(record),
            Ok(_) => warn!("Dropping malformed {} record {:?}", ns, key),
            Err(e) => warn!("Dropping unreadable {} record {:?}: {}", ns, key, e),
        }
    }
    Ok(records)
}
