use crate::storage::{validate_key, KeyValueStore, Namespace, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle that toggles write failures on a `MemoryStore` after it has been
/// moved into its owner
#[derive(Debug, Clone, Default)]
pub struct FailureSwitch {
    fail_writes: Arc<AtomicBool>,
}

impl FailureSwitch {
    /// Make every subsequent put/delete fail (simulates quota exceeded)
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn is_failing(&self) -> bool {
        self.fail_writes.load(Ordering::SeqCst)
    }
}

/// In-memory key-value store
///
/// Used by tests and as a scratch store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<(Namespace, String), Vec<u8>>,
    failure: FailureSwitch,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch controlling write failures for this store
    pub fn failure_switch(&self) -> FailureSwitch {
        self.failure.clone()
    }

    /// Shared counter of successful writes
    pub fn write_counter(&self) -> Arc<AtomicU64> {
        self.writes.clone()
    }

    /// Number of records across all namespaces
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn check_writable(&self, ns: Namespace, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        if self.failure.is_failing() {
            return Err(StorageError::WriteRejected(format!(
                "quota exceeded writing {}/{}",
                ns, key
            )));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_all(&self, ns: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .records
            .iter()
            .filter(|((n, _), _)| *n == ns)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    fn get(&self, ns: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.records.get(&(ns, key.to_string())).cloned())
    }

    fn put(&mut self, ns: Namespace, key: &str, value: &[u8]) -> StorageResult<()> {
        self.check_writable(ns, key)?;
        self.records.insert((ns, key.to_string()), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&mut self, ns: Namespace, key: &str) -> StorageResult<()> {
        self.check_writable(ns, key)?;
        self.records.remove(&(ns, key.to_string()));
        Ok(())
    }
}
