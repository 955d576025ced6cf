//! Chat artifact accessor: reads and writes per-conversation artifacts.
//!
//! Blob layout: `{conversation_id}/{patient_id}/{filename}` inside the patient
//! data container. Each segment escapes `%` as `%25` and `/` as `%2F`, so
//! distinct identifiers never share a path and plain ids stay readable.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tumorboard_core::artifact::{ArtifactIdentifier, ChatArtifact};
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

/// Escape one path segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('%', "%25").replace('/', "%2F")
}

#[derive(Clone)]
pub struct ChatArtifactAccessor {
    store: Arc<dyn BlobStore>,
    container: String,
}

impl ChatArtifactAccessor {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn get_blob_path(&self, id: &ArtifactIdentifier) -> String {
        format!(
            "{}/{}/{}",
            escape_segment(&id.conversation_id),
            escape_segment(&id.patient_id),
            escape_segment(&id.filename)
        )
    }

    pub fn get_url(&self, id: &ArtifactIdentifier) -> String {
        self.store.url(&self.container, &self.get_blob_path(id))
    }

    pub async fn read(&self, id: &ArtifactIdentifier) -> Result<ChatArtifact, StorageError> {
        let start = Instant::now();
        let blob_path = self.get_blob_path(id);
        let result = self.store.read(&self.container, &blob_path).await;
        info!(
            blob_path = %blob_path,
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Read artifact"
        );
        Ok(ChatArtifact::new(id.clone(), result?))
    }

    /// Upsert: an existing artifact at the same identifier is replaced.
    pub async fn write(&self, artifact: &ChatArtifact) -> Result<(), StorageError> {
        let start = Instant::now();
        let blob_path = self.get_blob_path(artifact.id());
        let result = self
            .store
            .write(&self.container, &blob_path, artifact.data().to_vec(), true)
            .await;
        info!(
            blob_path = %blob_path,
            bytes = artifact.data().len(),
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Wrote artifact"
        );
        result
    }

    /// Whether the artifact exists. Store failures are logged and reported
    /// as `false`, so callers cannot tell them apart from absence.
    pub async fn exists(&self, id: &ArtifactIdentifier) -> bool {
        let blob_path = self.get_blob_path(id);
        match self.store.exists(&self.container, &blob_path).await {
            Ok(found) => found,
            Err(e) => {
                warn!(blob_path = %blob_path, error = %e, "Artifact existence check failed");
                false
            }
        }
    }

    /// Move every artifact of a conversation to `{timestamp}_{blob_path}`.
    /// Returns the number of blobs moved.
    pub async fn archive(&self, conversation_id: &str) -> Result<usize, StorageError> {
        let start = Instant::now();
        let prefix = format!("{}/", escape_segment(conversation_id));
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string();

        let blobs = self.store.list(&self.container, &prefix).await?;
        for blob in &blobs {
            let data = self.store.read(&self.container, blob).await?;
            self.store
                .write(&self.container, &format!("{timestamp}_{blob}"), data, true)
                .await?;
            self.store.delete(&self.container, blob).await?;
        }

        info!(
            conversation_id,
            archived = blobs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Archived conversation artifacts"
        );
        Ok(blobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use tumorboard_storage::InMemoryBlobStore;

    fn accessor() -> (Arc<InMemoryBlobStore>, ChatArtifactAccessor) {
        let store = Arc::new(InMemoryBlobStore::new());
        let accessor = ChatArtifactAccessor::new(store.clone(), "patient-data");
        (store, accessor)
    }

    #[test]
    fn blob_path_is_deterministic_and_readable() {
        let (_, accessor) = accessor();
        let id = ArtifactIdentifier::new("abc", "p1", "tumor_board_review-p1.docx");
        assert_eq!(accessor.get_blob_path(&id), "abc/p1/tumor_board_review-p1.docx");
        assert_eq!(accessor.get_blob_path(&id), accessor.get_blob_path(&id.clone()));
    }

    #[test]
    fn blob_path_is_injective() {
        let (_, accessor) = accessor();
        let ids = [
            ArtifactIdentifier::new("a/b", "c", "f"),
            ArtifactIdentifier::new("a", "b/c", "f"),
            ArtifactIdentifier::new("a", "b", "c/f"),
            ArtifactIdentifier::new("a%2Fb", "c", "f"),
            ArtifactIdentifier::new("a%", "2Fb", "f"),
            ArtifactIdentifier::new("a", "b", "f"),
        ];
        let paths: HashSet<String> = ids.iter().map(|id| accessor.get_blob_path(id)).collect();
        assert_eq!(paths.len(), ids.len());
        assert_eq!(accessor.get_blob_path(&ids[0]), "a%2Fb/c/f");
        assert_eq!(accessor.get_blob_path(&ids[3]), "a%252Fb/c/f");
    }

    #[tokio::test]
    async fn write_then_read_round_trips_and_overwrites() {
        let (store, accessor) = accessor();
        let id = ArtifactIdentifier::new("abc", "p1", "patient_timeline.json");

        accessor.write(&ChatArtifact::new(id.clone(), b"first".to_vec())).await.unwrap();
        accessor.write(&ChatArtifact::new(id.clone(), b"second".to_vec())).await.unwrap();

        let artifact = accessor.read(&id).await.unwrap();
        assert_eq!(artifact.data(), b"second");
        assert_eq!(artifact.id(), &id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_, accessor) = accessor();
        let id = ArtifactIdentifier::new("abc", "p1", "research_papers.json");
        assert!(accessor.read(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn exists_reflects_store() {
        let (_, accessor) = accessor();
        let id = ArtifactIdentifier::new("abc", "p1", "x.json");
        assert!(!accessor.exists(&id).await);
        accessor.write(&ChatArtifact::new(id.clone(), vec![1])).await.unwrap();
        assert!(accessor.exists(&id).await);
    }

    struct BrokenStore;

    #[async_trait]
    impl BlobStore for BrokenStore {
        async fn read(&self, _: &str, _: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        async fn write(&self, _: &str, _: &str, _: Vec<u8>, _: bool) -> Result<(), StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        async fn exists(&self, _: &str, _: &str) -> Result<bool, StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        async fn list(&self, _: &str, _: &str) -> Result<Vec<String>, StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Transport("connection reset".into()))
        }
        fn url(&self, container: &str, path: &str) -> String {
            format!("broken://{container}/{path}")
        }
    }

    #[tokio::test]
    async fn exists_swallows_transport_errors() {
        let accessor = ChatArtifactAccessor::new(Arc::new(BrokenStore), "patient-data");
        let id = ArtifactIdentifier::new("abc", "p1", "x.json");
        assert!(!accessor.exists(&id).await);
        assert!(matches!(
            accessor.write(&ChatArtifact::new(id, vec![])).await,
            Err(StorageError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn archive_moves_only_that_conversation() {
        let (store, accessor) = accessor();
        for (conv, file) in [("abc", "a.json"), ("abc", "b.json"), ("abcd", "c.json")] {
            let id = ArtifactIdentifier::new(conv, "p1", file);
            accessor.write(&ChatArtifact::new(id, vec![7])).await.unwrap();
        }

        let moved = accessor.archive("abc").await.unwrap();
        assert_eq!(moved, 2);

        let remaining = store.list("patient-data", "").await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert!(remaining.contains(&"abcd/p1/c.json".to_string()));
        assert!(remaining.iter().filter(|p| p.ends_with("_abc/p1/a.json")).count() == 1);
        assert!(!accessor.exists(&ArtifactIdentifier::new("abc", "p1", "a.json")).await);
    }

    #[test]
    fn url_comes_from_store() {
        let (_, accessor) = accessor();
        let id = ArtifactIdentifier::new("abc", "p1", "x.json");
        assert_eq!(accessor.get_url(&id), "memory://patient-data/abc/p1/x.json");
    }
}
