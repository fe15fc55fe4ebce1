use async_trait::async_trait;
use fs2::FileExt;
use log::debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::constants::STORE_LOCK_FILE;
use crate::error::MemoError;

/// Durable string documents addressed by key
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when nothing was ever stored under `key`
    async fn get(&self, key: &str) -> std::io::Result<Option<String>>;

    /// Replace the whole document under `key`
    async fn set(&self, key: &str, value: &str) -> std::io::Result<()>;
}

/// One JSON file per key inside a data directory
///
/// Writes go to a temporary file in the same directory and are renamed over the
/// target, so readers see either the old or the new document. The directory is
/// locked exclusively for the lifetime of the store.
pub struct FileKeyValueStore {
    dir: PathBuf,
    _lock_file: File,
}

impl FileKeyValueStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, MemoError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| MemoError::Storage(dir.clone(), e))?;

        let lock_path = dir.join(STORE_LOCK_FILE);
        let lock_file =
            File::create(&lock_path).map_err(|e| MemoError::Storage(lock_path.clone(), e))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| MemoError::StoreLocked(dir.clone()))?;
        // Lock is held until the store is dropped

        Ok(Self {
            dir,
            _lock_file: lock_file,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`, e.g. "@photo_memos" -> "%40photo_memos.json"
    ///
    /// Keys are percent-encoded, so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        let value = value.to_string();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(value.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            debug!("Wrote {} bytes to {}", value.len(), path.display());
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)?
    }
}

/// In-process store, for hosts that persist elsewhere and for tests
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> std::io::Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();

        assert_eq!(store.get("@photo_memos").await.unwrap(), None);
        store.set("@photo_memos", "{}").await.unwrap();
        store.set("@photo_memos", r#"{"p":[]}"#).await.unwrap();
        assert_eq!(
            store.get("@photo_memos").await.unwrap().as_deref(),
            Some(r#"{"p":[]}"#)
        );
        assert!(dir.path().join("%40photo_memos.json").exists());
    }

    #[test]
    fn test_second_open_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let _first = FileKeyValueStore::open(dir.path()).unwrap();

        match FileKeyValueStore::open(dir.path()) {
            Err(MemoError::StoreLocked(path)) => assert_eq!(path, dir.path()),
            Err(e) => panic!("expected StoreLocked, got {}", e),
            Ok(_) => panic!("second open should fail"),
        }
    }

    #[test]
    fn test_reopen_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        drop(FileKeyValueStore::open(dir.path()).unwrap());
        assert!(FileKeyValueStore::open(dir.path()).is_ok());
    }

    #[test]
    fn test_key_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();
        assert_eq!(
            store.path_for("@photo_memos"),
            dir.path().join("%40photo_memos.json")
        );
        assert_eq!(store.path_for("a/b"), dir.path().join("a%2Fb.json"));
        assert_eq!(store.path_for("../x"), dir.path().join("..%2Fx.json"));
        assert_ne!(store.path_for("a/b"), store.path_for("a_b"));
        assert_ne!(store.path_for("@a"), store.path_for("a"));
    }

    #[tokio::test]
    async fn test_similar_keys_keep_separate_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::open(dir.path()).unwrap();

        store.set("a/b", "slash").await.unwrap();
        store.set("a_b", "underscore").await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap().as_deref(), Some("slash"));
        assert_eq!(store.get("a_b").await.unwrap().as_deref(), Some("underscore"));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
