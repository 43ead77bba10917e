//! Session-scoped snapshot storage.
//!
//! The editor only ever stores two string blobs: the serialized state and
//! the serialized defaults. A store lives exactly as long as one editing
//! session and is never shared between sessions.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Key of the serialized user state.
pub const STATE_KEY: &str = "packvars.state";

/// Key of the serialized defaults.
pub const DEFAULTS_KEY: &str = "packvars.defaults";

/// Storage failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Key/value string storage scoped to one session.
pub trait SessionStore {
    /// Read the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Drop every blob of the session.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// In-process store, the analogue of one tab's session storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

/// Directory-backed store: one file per key under a session directory.
///
/// The CLI keeps one directory per named session so that repeated
/// invocations see the same snapshot until the session is cleared.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Store rooted at `root/<session>`.
    pub fn for_session(root: impl AsRef<Path>, session: &str) -> Self {
        Self {
            dir: root.as_ref().join(session),
        }
    }

    /// Directory holding the session's blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl SessionStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StoreError::Io { path, source })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.dir.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::default();
        assert_eq!(store.get(STATE_KEY).unwrap(), None);
        store.set(STATE_KEY, "{}").unwrap();
        assert_eq!(store.get(STATE_KEY).unwrap().as_deref(), Some("{}"));
        store.clear().unwrap();
        assert_eq!(store.get(STATE_KEY).unwrap(), None);
    }

    #[test]
    fn dir_store_is_scoped_per_session() {
        let tmp = tempfile::tempdir().unwrap();
        let mut a = DirStore::for_session(tmp.path(), "a");
        let b = DirStore::for_session(tmp.path(), "b");

        a.set(DEFAULTS_KEY, r#"{"x":0}"#).unwrap();
        assert_eq!(a.get(DEFAULTS_KEY).unwrap().as_deref(), Some(r#"{"x":0}"#));
        assert_eq!(b.get(DEFAULTS_KEY).unwrap(), None);

        a.clear().unwrap();
        assert!(!a.dir().exists());
        a.clear().unwrap();
    }
}
