//! Object store contract.
//!
//! Blobs live in named containers and are addressed by a `/`-separated path.
//! Implementations provide last-write-wins semantics and nothing more.

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob. Absent blobs yield [`StorageError::NotFound`].
    async fn read(&self, container: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write a blob. With `overwrite == false` an existing blob yields
    /// [`StorageError::AlreadyExists`].
    async fn write(
        &self,
        container: &str,
        path: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), StorageError>;

    async fn exists(&self, container: &str, path: &str) -> Result<bool, StorageError>;

    /// Paths of all blobs in `container` starting with `prefix`, sorted.
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn delete(&self, container: &str, path: &str) -> Result<(), StorageError>;

    /// Address of the blob in the store. Not necessarily fetchable without credentials.
    fn url(&self, container: &str, path: &str) -> String;
}
