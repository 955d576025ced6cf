//! Patient and generated images embedded into the exported document.

use tracing::warn;
use tumorboard_core::artifact::ArtifactIdentifier;
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::{ExportError, StorageError};
use tumorboard_data::DataAccess;

use crate::docx::{DocxTemplate, InlineImage};

pub const RADIOLOGY_KINDS: &[&str] = &["x-ray image", "CT image"];
pub const PATHOLOGY_KINDS: &[&str] = &["pathology image"];

/// Images of the given kinds, patient data first, then conversation output.
///
/// Images are optional: a blob that is missing, unreadable or not a
/// decodable image is logged and left out. Only a missing patient fails.
pub async fn get_patient_images(
    doc: &mut DocxTemplate,
    ctx: &ChatContext,
    data: &DataAccess,
    kinds: &[&str],
    height_inches: f64,
) -> Result<Vec<InlineImage>, ExportError> {
    let patient_id = ctx.patient_id.as_deref().ok_or(ExportError::NoPatientSelected)?;
    let mut images = Vec::new();

    for item in ctx.patient_data.iter().filter(|i| kinds.contains(&i.kind.as_str())) {
        let bytes = data.image_accessor.read(patient_id, &item.filename).await;
        if let Some(image) = embed(doc, bytes, patient_id, &item.filename, height_inches) {
            images.push(image);
        }
    }

    for item in ctx.output_data.iter().filter(|i| kinds.contains(&i.kind.as_str())) {
        let id = ArtifactIdentifier::new(ctx.conversation_id().as_str(), patient_id, &item.filename);
        let bytes = data
            .chat_artifact_accessor
            .read(&id)
            .await
            .map(|artifact| artifact.into_data());
        if let Some(image) = embed(doc, bytes, patient_id, &item.filename, height_inches) {
            images.push(image);
        }
    }

    Ok(images)
}

fn embed(
    doc: &mut DocxTemplate,
    bytes: Result<Vec<u8>, StorageError>,
    patient_id: &str,
    filename: &str,
    height_inches: f64,
) -> Option<InlineImage> {
    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => {
            warn!(patient_id, filename, "Image missing, skipping");
            return None;
        }
        Err(e) => {
            warn!(patient_id, filename, error = %e, "Image could not be read, skipping");
            return None;
        }
    };
    match doc.add_image(bytes, height_inches) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(patient_id, filename, error = %e, "Image could not be embedded, skipping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use tumorboard_core::artifact::ChatArtifact;
    use tumorboard_core::context::DataItem;
    use tumorboard_core::message::ConversationId;
    use tumorboard_data::{create_data_access, ContainerNames};
    use tumorboard_storage::{InMemoryBlobStore, StorageCredential};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image::RgbImage::new(width, height)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn patient_images_precede_generated_and_missing_are_skipped() {
        let store = Arc::new(InMemoryBlobStore::new());
        let data = create_data_access(store.clone(), StorageCredential::Anonymous, &ContainerNames::default());

        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        ctx.set_patient("p1");
        ctx.patient_data = vec![
            DataItem::new("CT image", "ct.png"),
            DataItem::new("pathology image", "slide.png"),
            DataItem::new("x-ray image", "gone.png"),
        ];
        ctx.output_data = vec![DataItem::new("x-ray image", "generated.png")];

        store.insert("patient-data", "p1/images/ct.png", png(40, 20)).await;
        store.insert("patient-data", "p1/images/slide.png", png(10, 10)).await;
        data.chat_artifact_accessor
            .write(&ChatArtifact::new(
                ArtifactIdentifier::new("abc", "p1", "generated.png"),
                png(10, 20),
            ))
            .await
            .unwrap();

        let mut doc = DocxTemplate::from_bytes(&crate::docx::scaffold_docx("").unwrap()).unwrap();
        let images = get_patient_images(&mut doc, &ctx, &data, RADIOLOGY_KINDS, 1.0).await.unwrap();

        let extents: Vec<(u64, u64)> = images.iter().map(InlineImage::extent).collect();
        assert_eq!(extents, vec![(1_828_800, 914_400), (457_200, 914_400)]);

        let pathology = get_patient_images(&mut doc, &ctx, &data, PATHOLOGY_KINDS, 1.0).await.unwrap();
        assert_eq!(pathology.len(), 1);
    }

    #[tokio::test]
    async fn unreadable_and_undecodable_images_are_skipped() {
        let store = Arc::new(InMemoryBlobStore::new());
        let data = create_data_access(store.clone(), StorageCredential::Anonymous, &ContainerNames::default());

        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        ctx.set_patient("p1");
        ctx.patient_data = vec![
            DataItem::new("CT image", "broken.png"),
            DataItem::new("CT image", "ct.png"),
        ];
        ctx.output_data = vec![DataItem::new("CT image", "scan.bmp")];

        store.insert("patient-data", "p1/images/broken.png", b"\x89PNG not really".to_vec()).await;
        store.insert("patient-data", "p1/images/ct.png", png(20, 10)).await;
        data.chat_artifact_accessor
            .write(&ChatArtifact::new(
                ArtifactIdentifier::new("abc", "p1", "scan.bmp"),
                b"BM\0\0not really".to_vec(),
            ))
            .await
            .unwrap();

        let mut doc = DocxTemplate::from_bytes(&crate::docx::scaffold_docx("").unwrap()).unwrap();
        let images = get_patient_images(&mut doc, &ctx, &data, RADIOLOGY_KINDS, 1.0).await.unwrap();

        let extents: Vec<(u64, u64)> = images.iter().map(InlineImage::extent).collect();
        assert_eq!(extents, vec![(1_828_800, 914_400)]);
    }

    #[tokio::test]
    async fn requires_patient() {
        let store = Arc::new(InMemoryBlobStore::new());
        let data = create_data_access(store, StorageCredential::Anonymous, &ContainerNames::default());
        let ctx = ChatContext::new(ConversationId::from("abc"));
        let mut doc = DocxTemplate::from_bytes(&crate::docx::scaffold_docx("").unwrap()).unwrap();
        assert!(matches!(
            get_patient_images(&mut doc, &ctx, &data, PATHOLOGY_KINDS, 1.7).await,
            Err(ExportError::NoPatientSelected)
        ));
    }
}
