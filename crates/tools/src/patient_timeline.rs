//! `create_patient_timeline`: turn the selected patient's clinical notes into
//! a dated timeline and save it as a chat artifact.

use serde::Deserialize;
use serde_json::json;
use tracing::info;
use tumorboard_core::artifact::{ArtifactIdentifier, ChatArtifact, ChatArtifactFilename};
use tumorboard_core::clinical::{PatientTimeline, PatientTimelineEntry};
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::ToolError;
use tumorboard_core::message::Message;
use tumorboard_core::provider::ResponseFormat;
use tumorboard_core::tool::ToolResult;

use crate::PluginConfiguration;

pub const NAME: &str = "create_patient_timeline";
pub const TIMELINE_SCHEMA_NAME: &str = "patient_timeline";

pub fn description() -> &'static str {
    "Creates a patient timeline document given the patient's medical history."
}

pub fn parameters_schema() -> serde_json::Value {
    json!({ "type": "object", "properties": {} })
}

/// Schema of the model's reply: timeline entries with their sources.
pub fn timeline_schema() -> serde_json::Value {
    let string = json!({ "type": "string" });
    json!({
        "type": "object",
        "properties": {
            "entries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": string,
                        "title": string,
                        "description": string,
                        "sources": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "note_id": string,
                                    "sentences": { "type": "array", "items": string }
                                },
                                "required": ["note_id", "sentences"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["date", "title", "description", "sources"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["entries"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct TimelineReply {
    entries: Vec<PatientTimelineEntry>,
}

fn failed(e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason: e.to_string(),
    }
}

pub async fn create_patient_timeline(
    config: &PluginConfiguration,
    ctx: &mut ChatContext,
) -> Result<ToolResult, ToolError> {
    let patient_id = ctx
        .patient_id
        .clone()
        .ok_or_else(|| failed("no patient is selected; call get_patient_data first"))?;

    let notes = config
        .data_access
        .clinical_note_accessor
        .read_all(&patient_id)
        .await
        .map_err(failed)?;
    if notes.is_empty() {
        return Err(failed(format!("no clinical notes found for patient {patient_id}")));
    }

    let messages = vec![
        Message::system(
            "Given the following patient medical history, create a chronological timeline of key events. \
             Use ISO dates (yyyy-mm-dd) when known and cite the clinical note ids each entry is based on.",
        ),
        Message::user(format!("Patient medical history:\n{}", notes.join("\n"))),
    ];
    let content = config
        .model
        .complete_structured(
            messages,
            ResponseFormat::json_schema(TIMELINE_SCHEMA_NAME, timeline_schema()),
        )
        .await
        .map_err(failed)?;
    let reply: TimelineReply =
        serde_json::from_str(&content).map_err(|e| failed(format!("malformed timeline: {e}")))?;

    let timeline = PatientTimeline {
        patient_id: patient_id.clone(),
        entries: reply.entries,
    };
    let payload = serde_json::to_vec(&timeline).map_err(failed)?;
    let id = ArtifactIdentifier::new(
        ctx.conversation_id().as_str(),
        &patient_id,
        ChatArtifactFilename::PatientTimeline.filename(),
    );
    config
        .data_access
        .chat_artifact_accessor
        .write(&ChatArtifact::new(id, payload))
        .await
        .map_err(failed)?;

    info!(patient_id = %patient_id, entries = timeline.entries.len(), "Created patient timeline");

    let value = serde_json::to_value(&timeline).map_err(failed)?;
    Ok(ToolResult::ok(String::new(), value.to_string()).with_data(value))
}
