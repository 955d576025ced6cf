//! Blob store implementations for the tumor board orchestrator.
//!
//! All stores implement the `tumorboard_core::BlobStore` trait:
//! - **memory**: process-local, for tests and throwaway sessions
//! - **local**: a directory tree on disk
//! - **azure**: Azure Blob Storage over REST (shared key, SAS or bearer)

pub mod azure;
pub mod credential;
pub mod in_memory;
pub mod local;
pub mod sas;

pub use azure::AzureBlobStore;
pub use credential::StorageCredential;
pub use in_memory::InMemoryBlobStore;
pub use local::FileBlobStore;
pub use sas::BlobSasDelegate;

use std::sync::Arc;
use tumorboard_config::{StorageBackend, StorageConfig};
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

/// Build the configured blob store together with the credential it uses.
pub fn build_from_config(
    config: &StorageConfig,
) -> Result<(Arc<dyn BlobStore>, StorageCredential), StorageError> {
    let credential = StorageCredential::from_config(config);
    let store: Arc<dyn BlobStore> = match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryBlobStore::new()),
        StorageBackend::Local => Arc::new(FileBlobStore::new(config.local_root())),
        StorageBackend::Azure => {
            let account_url = match (&config.account_url, &config.account_name) {
                (Some(url), _) => url.clone(),
                (None, Some(name)) => format!("https://{name}.blob.core.windows.net"),
                (None, None) => {
                    return Err(StorageError::Authentication(
                        "azure storage needs account_url or account_name".into(),
                    ));
                }
            };
            Arc::new(AzureBlobStore::new(&account_url, credential.clone())?)
        }
    };
    Ok((store, credential))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_from_config() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            ..StorageConfig::default()
        };
        let (store, credential) = build_from_config(&config).unwrap();
        assert!(matches!(credential, StorageCredential::Anonymous));
        store.write("patient-data", "x", vec![1], true).await.unwrap();
        assert!(store.exists("patient-data", "x").await.unwrap());
    }

    #[test]
    fn azure_backend_needs_an_account() {
        let config = StorageConfig {
            backend: StorageBackend::Azure,
            ..StorageConfig::default()
        };
        assert!(build_from_config(&config).is_err());

        let config = StorageConfig {
            backend: StorageBackend::Azure,
            account_name: Some("acct".into()),
            ..StorageConfig::default()
        };
        let (store, _) = build_from_config(&config).unwrap();
        assert_eq!(store.url("c", "b"), "https://acct.blob.core.windows.net/c/b");
    }
}
