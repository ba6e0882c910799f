//! JSON file-backed persistence for hivewatch state documents.
//!
//! Provides [`JsonStore`], a small document store that owns one `<name>.json`
//! file under a state directory and rewrites it whole on every save. Callers
//! keep their working state in memory and snapshot it after each mutation;
//! the store exists so the agent and alert documents survive restarts, not to
//! be a database.

#![forbid(unsafe_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while saving a document.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem read/write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;

/// A whole-file JSON document store.
///
/// Saves write to a sibling temp file first and rename into place, so a crash
/// mid-write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store for `<state_dir>/<name>.json`.
    #[must_use]
    pub fn new(state_dir: &Path, name: &str) -> Self {
        Self {
            path: state_dir.join(format!("{name}.json")),
        }
    }

    /// The path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, falling back to `T::default()` when the file is
    /// missing or unreadable. A corrupt file is logged and ignored rather
    /// than propagated; the caller's next save overwrites it.
    #[must_use]
    pub fn load<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state file, starting empty");
                return T::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read state file");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt state file, starting empty");
                T::default()
            }
        }
    }

    /// Serialize `value` and rewrite the backing file.
    pub fn save<T>(&self, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(value)?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), bytes = json.len(), "saved state file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path(), "nothing");

        let loaded: HashMap<String, u64> = store.load();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path(), "counts");

        let mut counts = HashMap::new();
        counts.insert("workers".to_string(), 7_u64);
        store.save(&counts).expect("save");

        let loaded: HashMap<String, u64> = store.load();
        assert_eq!(loaded.get("workers"), Some(&7));
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path(), "doc");

        store.save(&vec!["a", "b"]).expect("first save");
        store.save(&vec!["c"]).expect("second save");

        let loaded: Vec<String> = store.load();
        assert_eq!(loaded, vec!["c".to_string()]);
    }

    #[test]
    fn corrupt_file_loads_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path(), "broken");

        fs::write(store.path(), b"{not json").expect("write corrupt");

        let loaded: Vec<u32> = store.load();
        assert!(loaded.is_empty());
    }

    #[test]
    fn creates_missing_state_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("state").join("hivewatch");
        let store = JsonStore::new(&nested, "doc");

        store.save(&1_u32).expect("save into missing dir");
        let loaded: u32 = store.load();
        assert_eq!(loaded, 1);
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::new(dir.path(), "doc");
        store.save(&42_u32).expect("save");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("doc.json")]);
    }
}
