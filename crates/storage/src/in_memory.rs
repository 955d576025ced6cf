//! In-memory blob store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

type Key = (String, String);

/// Blobs kept in a sorted map keyed by `(container, path)`.
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<BTreeMap<Key, Vec<u8>>>>,
    writes: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(BTreeMap::new())),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Seed a blob without counting it as a write.
    pub async fn insert(&self, container: &str, path: &str, data: impl Into<Vec<u8>>) {
        self.blobs
            .write()
            .await
            .insert((container.to_string(), path.to_string()), data.into());
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn read(&self, container: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(&(container.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(container, path))
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write().await;
        let key = (container.to_string(), path.to_string());
        if !overwrite && blobs.contains_key(&key) {
            return Err(StorageError::AlreadyExists {
                container: container.into(),
                path: path.into(),
            });
        }
        blobs.insert(key, data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, container: &str, path: &str) -> Result<bool, StorageError> {
        Ok(self
            .blobs
            .read()
            .await
            .contains_key(&(container.to_string(), path.to_string())))
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|(c, p)| c == container && p.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn delete(&self, container: &str, path: &str) -> Result<(), StorageError> {
        self.blobs
            .write()
            .await
            .remove(&(container.to_string(), path.to_string()))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(container, path))
    }

    fn url(&self, container: &str, path: &str) -> String {
        format!("memory://{container}/{path}")
    }
}
