//! Tumor board review export: renders a Word template with the request fields
//! and the conversation's artifacts, then stores the document as a chat
//! artifact and returns a download link.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tumorboard_config::ExportConfig;
use tumorboard_core::artifact::{
    template_filename, ArtifactIdentifier, ChatArtifact, ChatArtifactFilename,
};
use tumorboard_core::clinical::{ClinicalTrial, PatientTimeline, ResearchPaper};
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::ExportError;
use tumorboard_data::{ArtifactUrlBuilder, DataAccess};
use tumorboard_providers::ChatModel;

use crate::docx::{xml_escape, DocxContext, DocxTemplate, RichText};
use crate::images::{get_patient_images, PATHOLOGY_KINDS, RADIOLOGY_KINDS};
use crate::summary::ClinicalSummarizer;
use crate::timeline_image::{create_timeline_images_by_height, first_page_height, MAX_HEIGHT_INCHES};

const LINK_COLOR: &str = "#0000ee";

/// Fields supplied by the model when it asks for an export.
///
/// Omitted text fields render blank; an omitted treatment list is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    /// Template number; the configured default when omitted.
    pub template_id: Option<u32>,
    pub patient_initials: Option<String>,
    pub patient_age: Option<String>,
    pub patient_sex: Option<String>,
    /// Diagnosis in a few words, acronyms preferred.
    pub patient_dx: Option<String>,
    pub reason_for_presentation: Option<String>,
    pub clinical_history: Option<String>,
    pub clinical_stage: Option<String>,
    pub past_med_history: Option<String>,
    pub past_surgical_history: Option<String>,
    pub previous_treatment: Vec<String>,
    pub treatment_recommendation: Option<String>,
}

impl ExportRequest {
    /// JSON schema of the request, as advertised to the model.
    pub fn parameters_schema() -> serde_json::Value {
        let text = |description: &str| json!({ "type": "string", "description": description });
        json!({
            "type": "object",
            "properties": {
                "template_id": {
                    "type": "integer",
                    "description": "Template ID. If it is not provided use the number 2."
                },
                "patient_initials": text("Patient initials."),
                "patient_age": text("Patient age."),
                "patient_sex": text("Patient sex."),
                "patient_dx": text("Summarized patient diagnosis in less than 10 words. Use acronyms whenever possible."),
                "reason_for_presentation": text("Reason for presenting the case to the tumor board."),
                "clinical_history": text("Summarized clinical history in less than 10 words. Use acronyms whenever possible."),
                "clinical_stage": text("Clinical stage of the patient."),
                "past_med_history": text("Past medical history."),
                "past_surgical_history": text("Past surgical history."),
                "previous_treatment": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Previous treatments."
                },
                "treatment_recommendation": text("Treatment recommendation.")
            }
        })
    }
}

pub struct ContentExportPlugin {
    data_access: Arc<DataAccess>,
    summarizer: ClinicalSummarizer,
    settings: ExportConfig,
    urls: ArtifactUrlBuilder,
}

impl ContentExportPlugin {
    pub fn new(data_access: Arc<DataAccess>, model: ChatModel, settings: ExportConfig) -> Self {
        Self {
            summarizer: ClinicalSummarizer::new(model, settings.summary_max_entries),
            urls: ArtifactUrlBuilder::new(&settings.artifacts_base_url),
            data_access,
            settings,
        }
    }

    pub fn settings(&self) -> &ExportConfig {
        &self.settings
    }

    pub fn template_path(&self, template_id: u32) -> PathBuf {
        self.settings.templates_dir.join(template_filename(template_id))
    }

    /// Generate the tumor board review document and return a message with its link.
    pub async fn export_to_word_doc(
        &self,
        ctx: &mut ChatContext,
        request: ExportRequest,
    ) -> Result<String, ExportError> {
        let start = Instant::now();
        let patient_id = ctx.patient_id.clone().ok_or(ExportError::NoPatientSelected)?;
        let conversation_id = ctx.conversation_id().as_str().to_string();
        let temp_dir = tempfile::tempdir().map_err(|e| ExportError::Io(e.to_string()))?;

        let template_id = request.template_id.unwrap_or(self.settings.default_template_id);
        let template_path = self.template_path(template_id);
        info!(template = %template_path.display(), "Loading export template");
        let template_bytes = match tokio::fs::read(&template_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ExportError::TemplateNotFound { path: template_path });
            }
            Err(e) => return Err(ExportError::Io(format!("{}: {e}", template_path.display()))),
        };
        let mut doc = DocxTemplate::from_bytes(&template_bytes)?;

        let mut context = DocxContext::new();
        context.insert_plain("patient_id", &patient_id)?;
        let fields = serde_json::to_value(&request)
            .map_err(|e| ExportError::Template(e.to_string()))?;
        if let serde_json::Value::Object(fields) = fields {
            for (key, value) in fields {
                context.insert_plain(&key, &value)?;
            }
        }

        let sections = &self.settings.sections;
        let timeline = if sections.needs_timeline() {
            Some(self.load_patient_timeline(&conversation_id, &patient_id).await?)
        } else {
            None
        };

        let summary = match (&timeline, sections.clinical_summary) {
            (Some(timeline), true) => self.summarizer.summarize(timeline).await?.entries,
            _ => Vec::new(),
        };
        context.insert_plain("clinical_summary", &summary)?;

        let rows = match (&timeline, sections.clinical_timeline || sections.timeline_images) {
            (Some(timeline), true) => timeline.timeline_rows(),
            _ => Vec::new(),
        };
        if sections.clinical_timeline {
            context.insert_plain("clinical_timeline", &rows)?;
        } else {
            context.insert_plain("clinical_timeline", &Vec::<()>::new())?;
        }

        let trials = if sections.clinical_trials {
            clinical_trials_value(&mut doc, &ctx.display_clinical_trials)
        } else {
            Vec::new()
        };
        context.insert_markup("clinical_trials", trials.into());

        let papers = if sections.research_papers {
            let papers = self.load_research_papers(&conversation_id, &patient_id).await;
            research_papers_value(&mut doc, &papers)
        } else {
            Vec::new()
        };
        context.insert_markup("research_papers", papers.into());

        let mut timeline_images = Vec::new();
        if sections.timeline_images {
            let pages = create_timeline_images_by_height(
                &rows,
                first_page_height(&summary),
                MAX_HEIGHT_INCHES,
                temp_dir.path(),
            )?;
            for page in pages {
                let bytes = tokio::fs::read(&page)
                    .await
                    .map_err(|e| ExportError::Io(format!("{}: {e}", page.display())))?;
                timeline_images.push(doc.add_image_native(bytes)?.to_value());
            }
        }
        context.insert_markup("timeline_images", timeline_images.into());

        let height = self.settings.image_height_inches;
        let radiology = if sections.radiology_images {
            get_patient_images(&mut doc, ctx, &self.data_access, RADIOLOGY_KINDS, height).await?
        } else {
            Vec::new()
        };
        context.insert_markup(
            "radiology_images",
            radiology.iter().map(|i| i.to_value()).collect::<Vec<_>>().into(),
        );

        let pathology = if sections.pathology_images {
            get_patient_images(&mut doc, ctx, &self.data_access, PATHOLOGY_KINDS, height).await?
        } else {
            Vec::new()
        };
        context.insert_markup(
            "pathology_images",
            pathology.iter().map(|i| i.to_value()).collect::<Vec<_>>().into(),
        );

        doc.render(&context)?;
        let bytes = doc.save()?;

        let filename = ChatArtifactFilename::TumorBoardReview(patient_id.clone()).filename();
        let artifact_id = ArtifactIdentifier::new(&conversation_id, &patient_id, &filename);
        let blob_path = self.data_access.chat_artifact_accessor.get_blob_path(&artifact_id);
        let url = self.urls.url_for(&blob_path);

        self.data_access
            .chat_artifact_accessor
            .write(&ChatArtifact::new(artifact_id, bytes))
            .await?;
        ctx.display_blob_urls.push(url.clone());

        info!(
            patient_id = %patient_id,
            blob_path = %blob_path,
            duration_ms = start.elapsed().as_millis() as u64,
            "Exported tumor board review"
        );
        Ok(download_message(&url, &filename))
    }

    async fn load_patient_timeline(
        &self,
        conversation_id: &str,
        patient_id: &str,
    ) -> Result<PatientTimeline, ExportError> {
        let filename = ChatArtifactFilename::PatientTimeline.filename();
        let id = ArtifactIdentifier::new(conversation_id, patient_id, &filename);
        let artifact = self.data_access.chat_artifact_accessor.read(&id).await?;
        serde_json::from_slice(artifact.data()).map_err(|e| ExportError::InvalidArtifact {
            filename,
            reason: e.to_string(),
        })
    }

    /// Papers saved in this conversation; empty when there are none or they cannot be read.
    async fn load_research_papers(&self, conversation_id: &str, patient_id: &str) -> Vec<ResearchPaper> {
        let id = ArtifactIdentifier::new(
            conversation_id,
            patient_id,
            ChatArtifactFilename::ResearchPapers.filename(),
        );
        let artifact = match self.data_access.chat_artifact_accessor.read(&id).await {
            Ok(artifact) => artifact,
            Err(e) if e.is_not_found() => {
                warn!(patient_id, "No research papers saved for this conversation");
                return Vec::new();
            }
            Err(e) => {
                warn!(patient_id, error = %e, "Failed to read research papers");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<BTreeMap<String, ResearchPaper>>(artifact.data()) {
            Ok(papers) => papers.into_values().collect(),
            Err(e) => {
                warn!(patient_id, error = %e, "Research papers artifact is malformed");
                Vec::new()
            }
        }
    }
}

fn link(doc: &mut DocxTemplate, title: &str, url: &str) -> serde_json::Value {
    let url_id = doc.build_url_id(url);
    RichText::new(title)
        .color(LINK_COLOR)
        .underline()
        .link(url_id)
        .to_value()
}

fn clinical_trials_value(doc: &mut DocxTemplate, trials: &[ClinicalTrial]) -> Vec<serde_json::Value> {
    trials
        .iter()
        .map(|trial| {
            json!({
                "title": link(doc, &trial.title, &trial.url),
                "summary": xml_escape(&trial.summary),
            })
        })
        .collect()
}

fn research_papers_value(doc: &mut DocxTemplate, papers: &[ResearchPaper]) -> Vec<serde_json::Value> {
    papers
        .iter()
        .map(|paper| {
            json!({
                "title": link(doc, &paper.title, &paper.url),
                "authors": xml_escape(&paper.authors),
            })
        })
        .collect()
}

/// Reply shown to the user after a successful export.
fn download_message(url: &str, filename: &str) -> String {
    format!(
        "The Word document has been successfully created. You can download it using the link below:<br><br><a href=\"{}\">{}</a>",
        xml_escape(url),
        xml_escape(filename)
    )
}
