//! Filesystem blob store.
//!
//! Each container is a directory under the root and each blob a file at its
//! path inside it. Useful for local development without a storage account.
//!
//! Layout: `{root}/{container}/{path}`

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a blob to a file path, rejecting anything that could escape the root.
    fn resolve(&self, container: &str, path: &str) -> Result<PathBuf, StorageError> {
        let mut full = self.root.join(checked(container)?);
        for segment in path.split('/') {
            full.push(checked(segment)?);
        }
        Ok(full)
    }
}

fn checked(segment: &str) -> Result<&str, StorageError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(StorageError::InvalidPath(segment.to_string())),
    }
}

fn io_error(container: &str, path: &str, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::not_found(container, path)
    } else {
        StorageError::Io(format!("{container}/{path}: {e}"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn read(&self, container: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let file = self.resolve(container, path)?;
        tokio::fs::read(&file)
            .await
            .map_err(|e| io_error(container, path, e))
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let file = self.resolve(container, path)?;
        if !overwrite && tokio::fs::try_exists(&file).await.unwrap_or(false) {
            return Err(StorageError::AlreadyExists {
                container: container.into(),
                path: path.into(),
            });
        }
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(container, path, e))?;
        }
        tokio::fs::write(&file, data)
            .await
            .map_err(|e| io_error(container, path, e))?;
        debug!(file = %file.display(), "Blob written");
        Ok(())
    }

    async fn exists(&self, container: &str, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve(container, path)?;
        tokio::fs::try_exists(&file)
            .await
            .map_err(|e| io_error(container, path, e))
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let base = self.root.join(checked(container)?);
        let mut found = Vec::new();
        let mut pending = vec![(base.clone(), String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(container, &rel, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error(container, &rel, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let blob = if rel.is_empty() { name } else { format!("{rel}/{name}") };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| io_error(container, &blob, e))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), blob));
                } else if blob.starts_with(prefix) {
                    found.push(blob);
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn delete(&self, container: &str, path: &str) -> Result<(), StorageError> {
        let file = self.resolve(container, path)?;
        tokio::fs::remove_file(&file)
            .await
            .map_err(|e| io_error(container, path, e))
    }

    fn url(&self, container: &str, path: &str) -> String {
        format!("file://{}/{container}/{path}", self.root.display())
    }
}
