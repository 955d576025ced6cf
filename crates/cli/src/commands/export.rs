//! `tumorboard export`: generate a tumor board review without a chat.
//!
//! Loads the patient like `get_patient_data` would, optionally builds the
//! timeline, then renders the document from a JSON request file.

use serde_json::json;
use std::path::PathBuf;
use tumorboard_config::AppConfig;
use tumorboard_core::artifact::{ArtifactIdentifier, ChatArtifactFilename};
use tumorboard_core::context::ChatContext;
use tumorboard_core::message::ConversationId;
use tumorboard_core::tool::ToolCall;
use tumorboard_export::ExportRequest;

use super::runtime::Runtime;

pub async fn run(
    patient: String,
    input: Option<PathBuf>,
    conversation: Option<String>,
    with_timeline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::build(&config)?;

    let request: ExportRequest = match &input {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            serde_json::from_str(&text).map_err(|e| format!("Invalid export request: {e}"))?
        }
        None => ExportRequest::default(),
    };

    let conversation_id = conversation.map(ConversationId::from).unwrap_or_default();
    let mut ctx = ChatContext::new(conversation_id);

    let calls = [
        Some(("get_patient_data", json!({ "patient_id": &patient }))),
        with_timeline.then(|| ("create_patient_timeline", json!({}))),
        Some(("export_to_word_doc", serde_json::to_value(&request)?)),
    ];
    let mut output = String::new();
    for (i, (name, arguments)) in calls.into_iter().flatten().enumerate() {
        let call = ToolCall {
            id: format!("cli_{i}"),
            name: name.into(),
            arguments,
        };
        output = runtime
            .dispatcher
            .execute(&call, &mut ctx)
            .await
            .map_err(|e| format!("{name} failed: {e}"))?
            .output;
    }

    println!("Conversation: {}", ctx.conversation_id());
    println!("{output}");

    let sas = &runtime.data_access.blob_sas_delegate;
    if sas.can_sign() {
        let accessor = &runtime.data_access.chat_artifact_accessor;
        let id = ArtifactIdentifier::new(
            ctx.conversation_id().as_str(),
            &patient,
            ChatArtifactFilename::TumorBoardReview(patient.clone()).filename(),
        );
        match sas.get_blob_sas_url(accessor.container(), &accessor.get_blob_path(&id)) {
            Ok(url) => println!("Signed download link: {url}"),
            Err(e) => tracing::warn!(error = %e, "Could not sign download link"),
        }
    }
    Ok(())
}
