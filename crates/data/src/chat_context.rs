//! Persisted chat-context files (transcripts and similar) per conversation.

use std::sync::Arc;
use tracing::{error, info, warn};
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

/// File name of the persisted transcript.
pub const CHAT_HISTORY_FILE: &str = "chat_history.json";

#[derive(Clone)]
pub struct ChatContextAccessor {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl ChatContextAccessor {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn get_blob_path(&self, conversation_id: &str, context_file: &str) -> String {
        format!("{conversation_id}/{context_file}")
    }

    pub async fn read(&self, conversation_id: &str, context_file: &str) -> Result<Vec<u8>, StorageError> {
        let blob_path = self.get_blob_path(conversation_id, context_file);
        self.store
            .read(&self.container, &blob_path)
            .await
            .inspect_err(|e| error!(blob_path = %blob_path, error = %e, "Failed to read chat context"))
    }

    pub async fn write(
        &self,
        conversation_id: &str,
        context_file: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        let blob_path = self.get_blob_path(conversation_id, context_file);
        match self.store.write(&self.container, &blob_path, data, true).await {
            Ok(()) => {
                info!(blob_path = %blob_path, "Wrote chat context");
                Ok(())
            }
            Err(e) => {
                error!(blob_path = %blob_path, error = %e, "Failed to write chat context");
                Err(e)
            }
        }
    }

    /// Store failures are logged and reported as `false`.
    pub async fn exists(&self, conversation_id: &str, context_file: &str) -> bool {
        let blob_path = self.get_blob_path(conversation_id, context_file);
        self.store
            .exists(&self.container, &blob_path)
            .await
            .unwrap_or_else(|e| {
                warn!(blob_path = %blob_path, error = %e, "Chat context existence check failed");
                false
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumorboard_storage::InMemoryBlobStore;

    #[tokio::test]
    async fn transcript_round_trip() {
        let store = Arc::new(InMemoryBlobStore::new());
        let accessor = ChatContextAccessor::new(store.clone(), "chat-contexts");

        assert!(!accessor.exists("abc", CHAT_HISTORY_FILE).await);
        accessor
            .write("abc", CHAT_HISTORY_FILE, b"[]".to_vec())
            .await
            .unwrap();
        assert!(accessor.exists("abc", CHAT_HISTORY_FILE).await);
        assert_eq!(accessor.read("abc", CHAT_HISTORY_FILE).await.unwrap(), b"[]");
        assert!(store.exists("chat-contexts", "abc/chat_history.json").await.unwrap());
    }
}
