//! Clinical summary of a patient timeline, produced by one structured LLM call.

use serde_json::json;
use tracing::info;
use tumorboard_core::clinical::{ClinicalSummary, PatientTimeline};
use tumorboard_core::error::ExportError;
use tumorboard_core::message::Message;
use tumorboard_core::provider::ResponseFormat;
use tumorboard_providers::ChatModel;

pub const SUMMARY_SCHEMA_NAME: &str = "clinical_summary";

pub fn summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "entries": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["entries"],
        "additionalProperties": false
    })
}

#[derive(Debug, Clone)]
pub struct ClinicalSummarizer {
    model: ChatModel,
    max_entries: usize,
}

impl ClinicalSummarizer {
    pub fn new(model: ChatModel, max_entries: usize) -> Self {
        Self { model, max_entries }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn messages(&self, timeline: &PatientTimeline) -> Result<Vec<Message>, ExportError> {
        let history = serde_json::to_string(&timeline.clinical_history())
            .map_err(|e| ExportError::Summary(e.to_string()))?;
        Ok(vec![
            Message::system(format!(
                "Create a clinical summary of a cancer patient for tumor board review. \
                 Summarize each entry in a concise manner, highlighting key points. \
                 Limit the summary to {} entries.",
                self.max_entries
            )),
            Message::system(format!("You have access to the following patient history:\n{history}")),
        ])
    }

    /// Summarize the timeline into at most `max_entries` bullet points.
    pub async fn summarize(&self, timeline: &PatientTimeline) -> Result<ClinicalSummary, ExportError> {
        let messages = self.messages(timeline)?;
        let format = ResponseFormat::json_schema(SUMMARY_SCHEMA_NAME, summary_schema());
        let content = self.model.complete_structured(messages, format).await?;

        let mut summary: ClinicalSummary =
            serde_json::from_str(&content).map_err(|e| ExportError::Summary(e.to_string()))?;
        let returned = summary.entries.len();
        summary.truncate(self.max_entries);
        info!(
            patient_id = %timeline.patient_id,
            returned,
            kept = summary.entries.len(),
            "Generated clinical summary"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tumorboard_core::clinical::PatientTimelineEntry;
    use tumorboard_core::error::ProviderError;
    use tumorboard_core::provider::{Provider, ProviderRequest, ProviderResponse};

    struct FixedReply {
        reply: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for FixedReply {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(self.reply.clone()),
                usage: None,
                model: "fixed".into(),
            })
        }
    }

    fn summarizer(reply: &str, model: &str, max: usize) -> (ClinicalSummarizer, Arc<FixedReply>) {
        let provider = Arc::new(FixedReply {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        });
        (ClinicalSummarizer::new(ChatModel::new(provider.clone(), model, &[]), max), provider)
    }

    fn timeline() -> PatientTimeline {
        PatientTimeline {
            patient_id: "p1".into(),
            entries: vec![
                PatientTimelineEntry {
                    date: Some("2023-01-04".into()),
                    title: Some("Biopsy".into()),
                    description: Some("Adenocarcinoma".into()),
                    sources: vec![],
                },
                PatientTimelineEntry::default(),
            ],
        }
    }

    #[tokio::test]
    async fn oversized_response_is_truncated() {
        let entries: Vec<String> = (1..=9).map(|i| format!("point {i}")).collect();
        let reply = json!({ "entries": entries }).to_string();
        let (summarizer, _) = summarizer(&reply, "gpt-4o", 6);

        let summary = summarizer.summarize(&timeline()).await.unwrap();
        assert_eq!(summary.entries.len(), 6);
        assert_eq!(summary.entries[5], "point 6");
    }

    #[tokio::test]
    async fn request_carries_prompts_schema_and_temperature() {
        let (summarizer, provider) = summarizer(r#"{"entries":["a"]}"#, "gpt-4o", 6);
        summarizer.summarize(&timeline()).await.unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let request = &seen[0];
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.response_format.as_ref().unwrap().name, "clinical_summary");
        assert!(request.response_format.as_ref().unwrap().strict);
        assert!(request.messages[0].content.contains("Limit the summary to 6 entries."));
        assert!(request.messages[1].content.starts_with("You have access to the following patient history:\n"));
        assert!(request.messages[1].content.contains("\"title\":\"Biopsy\""));
        assert!(request.messages[1].content.contains("\"title\":\"Untitled\""));
        assert!(request.messages[1].content.contains("No description available."));
    }

    #[tokio::test]
    async fn reasoning_model_gets_no_temperature() {
        let (summarizer, provider) = summarizer(r#"{"entries":[]}"#, "o1-preview", 6);
        summarizer.summarize(&timeline()).await.unwrap();
        assert_eq!(provider.seen.lock().unwrap()[0].temperature, None);
    }

    #[tokio::test]
    async fn malformed_reply_is_summary_error() {
        let (summarizer, _) = summarizer("Here is your summary: ...", "gpt-4o", 6);
        let err = summarizer.summarize(&timeline()).await.unwrap_err();
        assert!(matches!(err, ExportError::Summary(_)));
    }
}
