//! `get_patient_data`: select a patient and load their records.

use serde::Serialize;
use tracing::{info, warn};
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::{Error, ToolError};
use tumorboard_core::tool::ToolResult;

use crate::PluginConfiguration;

pub const NAME: &str = "get_patient_data";

pub fn description() -> &'static str {
    "Select a patient for this conversation and load their clinical notes and image metadata."
}

pub fn parameters_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "patient_id": {
                "type": "string",
                "description": "The patient identifier"
            }
        },
        "required": ["patient_id"]
    })
}

#[derive(Debug, Serialize)]
struct PatientDataOutput<'a> {
    patient_id: &'a str,
    images: usize,
    clinical_notes: Vec<serde_json::Value>,
}

fn failed(e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: NAME.into(),
        reason: e.to_string(),
    }
}

pub async fn get_patient_data(
    config: &PluginConfiguration,
    ctx: &mut ChatContext,
    patient_id: &str,
) -> Result<ToolResult, ToolError> {
    if patient_id.trim().is_empty() {
        return Err(ToolError::InvalidArguments("'patient_id' must not be empty".into()));
    }
    ctx.set_patient(patient_id);

    let data = &config.data_access;
    ctx.patient_data = match data.image_accessor.get_metadata_list(patient_id).await {
        Ok(items) => items,
        Err(Error::Storage(e)) if e.is_not_found() => {
            warn!(patient_id, "No image metadata for patient");
            Vec::new()
        }
        Err(e) => return Err(failed(e)),
    };

    let notes = data
        .clinical_note_accessor
        .read_all(patient_id)
        .await
        .map_err(failed)?;
    let clinical_notes: Vec<serde_json::Value> = notes
        .iter()
        .map(|note| serde_json::from_str(note).unwrap_or_else(|_| serde_json::Value::String(note.clone())))
        .collect();

    info!(
        patient_id,
        notes = clinical_notes.len(),
        images = ctx.patient_data.len(),
        "Loaded patient data"
    );

    let output = PatientDataOutput {
        patient_id,
        images: ctx.patient_data.len(),
        clinical_notes,
    };
    let value = serde_json::to_value(&output).map_err(failed)?;
    Ok(ToolResult::ok(String::new(), value.to_string()).with_data(value))
}
