//! Storage persisted as a JSON object file.
//!
//! The native counterpart of browser persisted storage: every key lives in
//! one flat `{ "key": "value" }` document. Each write rewrites the file
//! through a temporary sibling and a rename, so a crash mid-write leaves
//! either the old or the new document, never half of one.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{Storage, StoreError};

type Entries = BTreeMap<String, String>;

/// A [`Storage`] that keeps its entries in a JSON file.
///
/// A missing file is an empty store. The mutex serializes this process's
/// read-modify-write cycles; it does not protect against other processes.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Opens (without creating) the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Entries, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(Entries::new());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        if text.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, entries: &Entries) -> Result<(), StoreError> {
        let text =
            serde_json::to_string_pretty(entries).map_err(StoreError::Encode)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut Entries) -> bool,
    ) -> Result<(), StoreError> {
        let _guard =
            self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read()?;
        if apply(&mut entries) {
            self.write(&entries)?;
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref()
                != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_in(dir: &tempfile::TempDir) -> FileStorage {
        FileStorage::new(dir.path().join("session.json"))
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        assert_eq!(storage.get("token").unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        storage_in(&dir).set("token", "abc.def.ghi").unwrap();

        let reopened = storage_in(&dir);
        assert_eq!(
            reopened.get("token").unwrap().as_deref(),
            Some("abc.def.ghi")
        );
    }

    #[test]
    fn test_remove_deletes_only_that_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        storage.set("token", "a").unwrap();
        storage.set("organizer_token", "b").unwrap();

        storage.remove("token").unwrap();

        assert_eq!(storage.get("token").unwrap(), None);
        assert_eq!(storage.get("organizer_token").unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn test_values_are_stored_verbatim() {
        // Quotes are the repair service's business, not the backend's.
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        storage.set("token", "\"abc.def.ghi\"").unwrap();
        assert_eq!(
            storage.get("token").unwrap().as_deref(),
            Some("\"abc.def.ghi\"")
        );
    }

    #[test]
    fn test_corrupt_file_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);
        fs::write(storage.path(), "not json").unwrap();
        assert!(matches!(
            storage.get("token"),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/deeper/s.json"));
        storage.set("token", "x").unwrap();
        assert!(storage.path().exists());
    }
}
