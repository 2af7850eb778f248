//! Session storage backed by a JSON document on disk.
//!
//! The file holds a flat `{ key: value }` object, the same shape the browser
//! keeps in `localStorage`. Writes go through a temp file and a rename so an
//! interrupted command never leaves a truncated session behind.

#[cfg(test)]
#[path = "file_storage_test.rs"]
mod file_storage_test;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use voluntariado::{Storage, StorageError};

type Entries = BTreeMap<String, String>;

pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Entries {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Entries::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "session file unreadable");
                return Entries::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "ignoring malformed session file");
            Entries::new()
        })
    }

    fn store(&self, entries: &Entries) -> Result<(), StorageError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Write(e.to_string())),
            };
        }

        let raw = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Write(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw).map_err(|e| StorageError::Write(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
                .map_err(|e| StorageError::Write(e.to_string()))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::Write(e.to_string()))
    }

    fn update(&self, apply: impl FnOnce(&mut Entries)) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        apply(&mut entries);
        self.store(&entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
