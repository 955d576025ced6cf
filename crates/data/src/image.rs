//! Patient images stored under `{patient_id}/images/` with a `metadata.json`
//! index describing each file.

use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tumorboard_core::context::DataItem;
use tumorboard_core::error::{Error, StorageError};
use tumorboard_core::storage::BlobStore;

#[derive(Clone)]
pub struct ImageAccessor {
    store: Arc<dyn BlobStore>,
    container: String,
    folder: String,
}

impl ImageAccessor {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
            folder: "images".into(),
        }
    }

    pub fn get_blob_path(&self, patient_id: &str, filename: &str) -> String {
        format!("{patient_id}/{}/{filename}", self.folder)
    }

    pub fn get_url(&self, patient_id: &str, filename: &str) -> String {
        self.store
            .url(&self.container, &self.get_blob_path(patient_id, filename))
    }

    /// Image descriptors for a patient, each with its `url` filled in.
    pub async fn get_metadata_list(&self, patient_id: &str) -> Result<Vec<DataItem>, Error> {
        let start = Instant::now();
        let blob_path = self.get_blob_path(patient_id, "metadata.json");
        let result = self.store.read(&self.container, &blob_path).await;
        info!(
            patient_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Get image metadata"
        );

        let mut items: Vec<DataItem> = serde_json::from_slice(&result?)?;
        for item in &mut items {
            item.url = Some(self.get_url(patient_id, &item.filename));
        }
        Ok(items)
    }

    pub async fn read(&self, patient_id: &str, filename: &str) -> Result<Vec<u8>, StorageError> {
        let start = Instant::now();
        let blob_path = self.get_blob_path(patient_id, filename);
        let result = self.store.read(&self.container, &blob_path).await;
        info!(
            blob_path = %blob_path,
            duration_ms = start.elapsed().as_millis() as u64,
            "Read image"
        );
        result
    }
}
