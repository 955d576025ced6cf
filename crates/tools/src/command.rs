//! The closed set of tools the model may call, and their dispatch.

use std::time::Instant;
use tracing::{info, warn};
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::ToolError;
use tumorboard_core::provider::ToolDefinition;
use tumorboard_core::tool::{ToolCall, ToolResult};
use tumorboard_export::{ContentExportPlugin, ExportRequest};

use crate::{patient_data, patient_timeline, PluginConfiguration};

pub const EXPORT_TO_WORD_DOC: &str = "export_to_word_doc";

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetPatientData { patient_id: String },
    CreatePatientTimeline,
    ExportToWordDoc(ExportRequest),
}

impl Command {
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        match call.name.as_str() {
            patient_data::NAME => {
                let patient_id = call.arguments["patient_id"]
                    .as_str()
                    .ok_or_else(|| ToolError::InvalidArguments("Missing 'patient_id' argument".into()))?;
                Ok(Self::GetPatientData {
                    patient_id: patient_id.to_string(),
                })
            }
            patient_timeline::NAME => Ok(Self::CreatePatientTimeline),
            EXPORT_TO_WORD_DOC => {
                if call.arguments.is_null() {
                    return Ok(Self::ExportToWordDoc(ExportRequest::default()));
                }
                serde_json::from_value(call.arguments.clone())
                    .map(Self::ExportToWordDoc)
                    .map_err(|e| ToolError::InvalidArguments(format!("{EXPORT_TO_WORD_DOC}: {e}")))
            }
            other => Err(ToolError::NotFound(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GetPatientData { .. } => patient_data::NAME,
            Self::CreatePatientTimeline => patient_timeline::NAME,
            Self::ExportToWordDoc(_) => EXPORT_TO_WORD_DOC,
        }
    }

    /// Tool definitions advertised to the model.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: patient_data::NAME.into(),
                description: patient_data::description().into(),
                parameters: patient_data::parameters_schema(),
            },
            ToolDefinition {
                name: patient_timeline::NAME.into(),
                description: patient_timeline::description().into(),
                parameters: patient_timeline::parameters_schema(),
            },
            ToolDefinition {
                name: EXPORT_TO_WORD_DOC.into(),
                description: "Generate the tumor board review Word document for the selected patient \
                              and return a download link."
                    .into(),
                parameters: ExportRequest::parameters_schema(),
            },
        ]
    }
}

/// Runs decoded commands against the session context.
pub struct ToolDispatcher {
    config: PluginConfiguration,
    export: ContentExportPlugin,
}

impl ToolDispatcher {
    pub fn new(config: PluginConfiguration) -> Self {
        let export = ContentExportPlugin::new(
            config.data_access.clone(),
            config.model.clone(),
            config.export.clone(),
        );
        Self { config, export }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        Command::definitions()
    }

    pub async fn execute(&self, call: &ToolCall, ctx: &mut ChatContext) -> Result<ToolResult, ToolError> {
        let command = Command::parse(call)?;
        let name = command.name();
        let start = Instant::now();

        let result = match command {
            Command::GetPatientData { patient_id } => {
                patient_data::get_patient_data(&self.config, ctx, &patient_id).await
            }
            Command::CreatePatientTimeline => patient_timeline::create_patient_timeline(&self.config, ctx).await,
            Command::ExportToWordDoc(request) => self
                .export
                .export_to_word_doc(ctx, request)
                .await
                .map(|message| ToolResult::ok(String::new(), message))
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: EXPORT_TO_WORD_DOC.into(),
                    reason: e.to_string(),
                }),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(mut result) => {
                result.call_id = call.id.clone();
                info!(tool = name, duration_ms, "Tool executed");
                Ok(result)
            }
            Err(e) => {
                warn!(tool = name, duration_ms, error = %e, "Tool failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tumorboard_config::ExportConfig;
    use tumorboard_core::error::ProviderError;
    use tumorboard_core::message::{ConversationId, Message};
    use tumorboard_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use tumorboard_core::storage::BlobStore;
    use tumorboard_data::{create_data_access, ContainerNames};
    use tumorboard_providers::ChatModel;
    use tumorboard_storage::{InMemoryBlobStore, StorageCredential};

    struct Scripted {
        replies: Mutex<Vec<String>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let reply = self.replies.lock().unwrap().remove(0);
            Ok(ProviderResponse {
                message: Message::assistant(reply),
                usage: None,
                model: "scripted".into(),
            })
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    async fn dispatcher(replies: Vec<&str>) -> (ToolDispatcher, Arc<InMemoryBlobStore>, Arc<Scripted>) {
        let store = Arc::new(InMemoryBlobStore::new());
        store
            .insert(
                "patient-data",
                "p1/images/metadata.json",
                r#"[{"type":"CT image","filename":"ct1.png"}]"#,
            )
            .await;
        store
            .insert(
                "patient-data",
                "p1/clinical_notes/n1.json",
                r#"{"id":"n1","date":"2023-01-04","text":"Biopsy shows adenocarcinoma."}"#,
            )
            .await;
        store
            .insert("patient-data", "p2/clinical_notes/n9.json", "plain text note")
            .await;

        let provider = Arc::new(Scripted {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
        });
        let templates = std::env::temp_dir().join("tumorboard-missing-templates");
        let config = PluginConfiguration {
            model: ChatModel::new(provider.clone(), "gpt-4o", &[]),
            data_access: Arc::new(create_data_access(
                store.clone(),
                StorageCredential::Anonymous,
                &ContainerNames::default(),
            )),
            export: ExportConfig {
                templates_dir: templates,
                ..ExportConfig::default()
            },
        };
        (ToolDispatcher::new(config), store, provider)
    }

    #[test]
    fn parse_known_commands() {
        assert_eq!(
            Command::parse(&call("get_patient_data", json!({"patient_id": "p1"}))).unwrap(),
            Command::GetPatientData {
                patient_id: "p1".into()
            }
        );
        assert_eq!(
            Command::parse(&call("create_patient_timeline", json!({}))).unwrap(),
            Command::CreatePatientTimeline
        );
        let Command::ExportToWordDoc(request) =
            Command::parse(&call("export_to_word_doc", json!({"template_id": 3, "patient_age": "61"}))).unwrap()
        else {
            panic!("expected export");
        };
        assert_eq!(request.template_id, Some(3));
        assert_eq!(request.patient_age.as_deref(), Some("61"));
    }

    #[test]
    fn parse_rejects_unknown_and_malformed() {
        assert!(matches!(
            Command::parse(&call("shell", json!({}))),
            Err(ToolError::NotFound(name)) if name == "shell"
        ));
        assert!(matches!(
            Command::parse(&call("get_patient_data", json!({}))),
            Err(ToolError::InvalidArguments(_))
        ));
        assert!(matches!(
            Command::parse(&call("export_to_word_doc", json!({"previous_treatment": "x"}))),
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[test]
    fn definitions_cover_every_command() {
        let names: Vec<String> = Command::definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["get_patient_data", "create_patient_timeline", "export_to_word_doc"]
        );
    }

    #[tokio::test]
    async fn get_patient_data_selects_patient_and_loads_records() {
        let (dispatcher, _, _) = dispatcher(vec![]).await;
        let mut ctx = ChatContext::new(ConversationId::from("abc"));

        let result = dispatcher
            .execute(&call("get_patient_data", json!({"patient_id": "p1"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(result.call_id, "call_1");
        assert_eq!(ctx.patient_id.as_deref(), Some("p1"));
        assert_eq!(ctx.patient_data.len(), 1);
        assert!(ctx.patient_data[0].url.is_some());
        assert!(result.output.contains("adenocarcinoma"));

        // no image metadata for p2: empty, not an error
        let result = dispatcher
            .execute(&call("get_patient_data", json!({"patient_id": "p2"})), &mut ctx)
            .await
            .unwrap();
        assert!(ctx.patient_data.is_empty());
        assert_eq!(result.data.unwrap()["clinical_notes"][0], "plain text note");
    }

    #[tokio::test]
    async fn timeline_is_saved_as_artifact() {
        let reply = json!({
            "entries": [{
                "date": "2023-01-04",
                "title": "Biopsy",
                "description": "Adenocarcinoma",
                "sources": [{"note_id": "n1", "sentences": ["Biopsy shows adenocarcinoma."]}]
            }]
        })
        .to_string();
        let (dispatcher, store, provider) = dispatcher(vec![&reply]).await;
        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        ctx.set_patient("p1");

        dispatcher
            .execute(&call("create_patient_timeline", json!({})), &mut ctx)
            .await
            .unwrap();

        let saved = store.read("patient-data", "abc/p1/patient_timeline.json").await.unwrap();
        let timeline: tumorboard_core::clinical::PatientTimeline = serde_json::from_slice(&saved).unwrap();
        assert_eq!(timeline.patient_id, "p1");
        assert_eq!(timeline.entries[0].sources[0].note_id, "n1");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0].response_format.as_ref().unwrap().name, "patient_timeline");
        assert!(requests[0].messages[1].content.contains("Biopsy shows adenocarcinoma."));
    }

    #[tokio::test]
    async fn timeline_requires_patient() {
        let (dispatcher, _, _) = dispatcher(vec![]).await;
        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        let err = dispatcher
            .execute(&call("create_patient_timeline", json!({})), &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("get_patient_data"));
    }

    #[tokio::test]
    async fn export_failures_become_execution_errors() {
        let (dispatcher, store, _) = dispatcher(vec![]).await;
        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        ctx.set_patient("p1");

        let err = dispatcher
            .execute(&call("export_to_word_doc", json!({})), &mut ctx)
            .await
            .unwrap_err();
        match err {
            ToolError::ExecutionFailed { tool_name, reason } => {
                assert_eq!(tool_name, "export_to_word_doc");
                assert!(reason.contains("Template not found"), "{reason}");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.write_count(), 0);
    }
}
