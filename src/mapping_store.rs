use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{MemoError, Result};
use crate::kv::KeyValueStore;
use crate::model::{PhotoMemoMapping, VoiceMemoRecord};

/// Durable photo -> memos mapping stored as one document under one key
///
/// Reads fail soft: a missing, blank, unreadable or corrupt document is an empty
/// mapping. Writes always replace the whole document. Every mutation runs through
/// [`MappingStore::begin_write`], which holds the writer lock from load to save so
/// concurrent mutations cannot overwrite each other.
pub struct MappingStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    writer: Mutex<()>,
}

impl MappingStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn load(&self) -> PhotoMemoMapping {
        let document = match self.kv.get(&self.key).await {
            Ok(Some(document)) => document,
            Ok(None) => return PhotoMemoMapping::new(),
            Err(e) => {
                warn!("Failed to read memo mapping '{}': {}", self.key, e);
                return PhotoMemoMapping::new();
            }
        };

        if document.trim().is_empty() {
            return PhotoMemoMapping::new();
        }

        match PhotoMemoMapping::from_document(&document) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(
                    "Memo mapping '{}' is not valid JSON, treating as empty: {}",
                    self.key, e
                );
                PhotoMemoMapping::new()
            }
        }
    }

    pub async fn save(&self, mapping: &PhotoMemoMapping) -> Result<()> {
        let document = mapping
            .to_document()
            .map_err(|e| MemoError::StorageWrite {
                key: self.key.clone(),
                source: std::io::Error::other(e),
            })?;

        self.kv
            .set(&self.key, &document)
            .await
            .map_err(|source| MemoError::StorageWrite {
                key: self.key.clone(),
                source,
            })?;

        debug!(
            "Saved memo mapping: {} photos, {} memos",
            mapping.len(),
            mapping.total_memos()
        );
        Ok(())
    }

    /// Lock out other writers and load the current mapping for modification
    pub async fn begin_write(&self) -> MappingTransaction<'_> {
        let guard = self.writer.lock().await;
        let mapping = self.load().await;
        MappingTransaction {
            store: self,
            _guard: guard,
            mapping,
        }
    }

    pub async fn append(&self, photo_id: &str, record: VoiceMemoRecord) -> Result<()> {
        let mut tx = self.begin_write().await;
        tx.mapping_mut().append(photo_id, record);
        tx.commit().await
    }

    pub async fn remove(&self, photo_id: &str, index: usize) -> Result<VoiceMemoRecord> {
        let mut tx = self.begin_write().await;
        let removed = tx.mapping_mut().remove(photo_id, index)?;
        tx.commit().await?;
        Ok(removed)
    }
}

/// Loaded mapping plus the writer lock. Dropping it without `commit` discards the change.
pub struct MappingTransaction<'a> {
    store: &'a MappingStore,
    _guard: MutexGuard<'a, ()>,
    mapping: PhotoMemoMapping,
}

impl MappingTransaction<'_> {
    pub fn mapping(&self) -> &PhotoMemoMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut PhotoMemoMapping {
        &mut self.mapping
    }

    pub async fn commit(self) -> Result<()> {
        self.store.save(&self.mapping).await
    }
}
