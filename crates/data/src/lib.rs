//! Typed access to the blob store for the tumor board orchestrator.
//!
//! [`DataAccess`] bundles one accessor per kind of stored data, all bound to
//! the same [`BlobStore`]. It is built once at startup with
//! [`create_data_access`] and shared through an `Arc`.

pub mod chat_artifact;
pub mod chat_context;
pub mod clinical_note;
pub mod image;
pub mod url;

pub use chat_artifact::{escape_segment, ChatArtifactAccessor};
pub use chat_context::{ChatContextAccessor, CHAT_HISTORY_FILE};
pub use clinical_note::{ClinicalNoteAccessor, ClinicalNoteMetadata};
pub use image::ImageAccessor;
pub use url::ArtifactUrlBuilder;

use std::sync::Arc;
use tumorboard_core::storage::BlobStore;
use tumorboard_storage::{BlobSasDelegate, StorageCredential};

/// Container names used by the accessors.
#[derive(Debug, Clone)]
pub struct ContainerNames {
    pub patient_data: String,
    pub chat_contexts: String,
}

impl Default for ContainerNames {
    fn default() -> Self {
        Self {
            patient_data: "patient-data".into(),
            chat_contexts: "chat-contexts".into(),
        }
    }
}

impl From<&tumorboard_config::StorageConfig> for ContainerNames {
    fn from(config: &tumorboard_config::StorageConfig) -> Self {
        Self {
            patient_data: config.patient_data_container.clone(),
            chat_contexts: config.chat_context_container.clone(),
        }
    }
}

/// Data access layer for the application.
#[derive(Clone)]
pub struct DataAccess {
    pub blob_sas_delegate: BlobSasDelegate,
    pub chat_artifact_accessor: ChatArtifactAccessor,
    pub chat_context_accessor: ChatContextAccessor,
    pub clinical_note_accessor: ClinicalNoteAccessor,
    pub image_accessor: ImageAccessor,
}

pub fn create_data_access(
    client: Arc<dyn BlobStore>,
    credential: StorageCredential,
    containers: &ContainerNames,
) -> DataAccess {
    DataAccess {
        blob_sas_delegate: BlobSasDelegate::new(client.clone(), credential),
        chat_artifact_accessor: ChatArtifactAccessor::new(client.clone(), &containers.patient_data),
        chat_context_accessor: ChatContextAccessor::new(client.clone(), &containers.chat_contexts),
        clinical_note_accessor: ClinicalNoteAccessor::new(client.clone(), &containers.patient_data),
        image_accessor: ImageAccessor::new(client, &containers.patient_data),
    }
}
