//! Clinical notes stored as `{patient_id}/clinical_notes/{note_id}.json`.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

/// Notes read concurrently per batch.
const READ_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalNoteMetadata {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone)]
pub struct ClinicalNoteAccessor {
    store: Arc<dyn BlobStore>,
    container: String,
    folder: String,
}

impl ClinicalNoteAccessor {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            folder: "clinical_notes".into(),
        }
    }

    fn folder_prefix(&self, patient_id: &str) -> String {
        format!("{patient_id}/{}/", self.folder)
    }

    /// Distinct top-level folders of the container, sorted.
    pub async fn get_patients(&self) -> Result<Vec<String>, StorageError> {
        let start = Instant::now();
        let names = self.store.list(&self.container, "").await?;
        let patients: BTreeSet<String> = names
            .iter()
            .filter_map(|name| name.split('/').next())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        info!(duration_ms = start.elapsed().as_millis() as u64, "Get patients");
        Ok(patients.into_iter().collect())
    }

    pub async fn get_metadata_list(&self, patient_id: &str) -> Result<Vec<ClinicalNoteMetadata>, StorageError> {
        let start = Instant::now();
        let names = self
            .store
            .list(&self.container, &self.folder_prefix(patient_id))
            .await?;
        info!(
            patient_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Get clinical note ids"
        );
        Ok(names
            .iter()
            .map(|name| ClinicalNoteMetadata {
                id: parse_note_id(name).to_string(),
                kind: "clinical note".into(),
            })
            .collect())
    }

    pub async fn read(&self, patient_id: &str, note_id: &str) -> Result<String, StorageError> {
        let start = Instant::now();
        let blob_path = format!("{}{note_id}.json", self.folder_prefix(patient_id));
        let result = self.read_blob(&blob_path).await;
        info!(
            patient_id,
            note_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Read clinical note"
        );
        result
    }

    /// Every note of a patient, in listing order, fetched in concurrent batches.
    pub async fn read_all(&self, patient_id: &str) -> Result<Vec<String>, StorageError> {
        let start = Instant::now();
        let names = self
            .store
            .list(&self.container, &self.folder_prefix(patient_id))
            .await?;

        let mut notes = Vec::with_capacity(names.len());
        for batch in names.chunks(READ_BATCH_SIZE) {
            let results = try_join_all(batch.iter().map(|name| self.read_blob(name))).await?;
            notes.extend(results);
        }

        info!(
            patient_id,
            count = notes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Read all clinical notes"
        );
        Ok(notes)
    }

    async fn read_blob(&self, blob_path: &str) -> Result<String, StorageError> {
        let bytes = self.store.read(&self.container, blob_path).await?;
        String::from_utf8(bytes)
            .map_err(|e| StorageError::Io(format!("{blob_path} is not valid UTF-8: {e}")))
    }
}

/// `p1/clinical_notes/n-17.json` → `n-17`
fn parse_note_id(blob_name: &str) -> &str {
    let file = blob_name.rsplit('/').next().unwrap_or(blob_name);
    file.split('.').next().unwrap_or(file)
}
