use crate::storage::{validate_key, KeyValueStore, Namespace, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD_EXT: &str = "rec";
const TEMP_EXT: &str = "tmp";

/// Filesystem key-value store: `<root>/<namespace>/<key>.rec`
///
/// Writes go to a temporary file first and are renamed into place, so a
/// failed write never leaves a half-written record behind.
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        for ns in Namespace::ALL {
            fs::create_dir_all(root.join(ns.name()))?;
        }
        info!("Opened data store at {:?}", root);
        Ok(Self { root })
    }

    /// Default data directory: `$SIGNAGE_DATA_DIR`, else the platform data dir
    pub fn default_root() -> PathBuf {
        if let Some(dir) = std::env::var_os("SIGNAGE_DATA_DIR") {
            return PathBuf::from(dir);
        }
        dirs::data_dir()
            .map(|p| p.join("signage"))
            .unwrap_or_else(|| PathBuf::from("signage-data"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, ns: Namespace, key: &str) -> PathBuf {
        self.root.join(ns.name()).join(format!("{}.{}", key, RECORD_EXT))
    }
}

impl KeyValueStore for JsonDirStore {
    fn get_all(&self, ns: Namespace) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(self.root.join(ns.name()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            records.push((key.to_string(), fs::read(&path)?));
        }
        Ok(records)
    }

    fn get(&self, ns: Namespace, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.record_path(ns, key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&mut self, ns: Namespace, key: &str, value: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.record_path(ns, key);
        let temp = path.with_extension(TEMP_EXT);
        if let Err(e) = fs::write(&temp, value) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        fs::rename(&temp, &path)?;
        debug!("Wrote {}/{} ({} bytes)", ns, key, value.len());
        Ok(())
    }

    fn delete(&mut self, ns: Namespace, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.record_path(ns, key)) {
            Ok(()) => {
                debug!("Deleted {}/{}", ns, key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
