//! End-to-end tests for a tumor board conversation: the model selects a
//! patient, builds the timeline and exports the review document.

use std::sync::{Arc, Mutex};

use tumorboard_agent::ChatSession;
use tumorboard_config::ExportConfig;
use tumorboard_core::context::ChatContext;
use tumorboard_core::error::ProviderError;
use tumorboard_core::message::{Conversation, ConversationId, Message, MessageToolCall, Role};
use tumorboard_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tumorboard_core::storage::BlobStore;
use tumorboard_data::{create_data_access, ContainerNames, DataAccess};
use tumorboard_export::default_template;
use tumorboard_export::docx::read_part;
use tumorboard_providers::ChatModel;
use tumorboard_storage::{InMemoryBlobStore, StorageCredential};
use tumorboard_tools::{PluginConfiguration, ToolDispatcher};

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted messages in sequence and records every request.
struct ScriptedProvider {
    responses: Mutex<Vec<Message>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted after {} calls", requests.len());
        }
        requests.push(request);
        Ok(ProviderResponse {
            message: responses.remove(0),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "e2e_mock".into(),
        })
    }
}

fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Message {
    let mut message = Message::assistant("");
    message.tool_calls.push(MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.to_string(),
    });
    message
}

// ── Fixture ──────────────────────────────────────────────────────────────

struct Fixture {
    store: Arc<InMemoryBlobStore>,
    data: Arc<DataAccess>,
    session: ChatSession,
    _templates: tempfile::TempDir,
}

async fn fixture(provider: Arc<ScriptedProvider>) -> Fixture {
    let templates = tempfile::tempdir().unwrap();
    std::fs::write(
        templates.path().join("tumor_board_template2.docx"),
        default_template().unwrap(),
    )
    .unwrap();

    let store = Arc::new(InMemoryBlobStore::new());
    store
        .insert(
            "patient-data",
            "p1/clinical_notes/n1.json",
            r#"{"id":"n1","date":"2023-01-04","text":"CT-guided biopsy of the RUL mass shows adenocarcinoma."}"#,
        )
        .await;
    store
        .insert(
            "patient-data",
            "p1/clinical_notes/n2.json",
            r#"{"id":"n2","date":"2023-02-10","text":"EGFR exon 19 deletion detected."}"#,
        )
        .await;

    let data = Arc::new(create_data_access(
        store.clone(),
        StorageCredential::Anonymous,
        &ContainerNames::default(),
    ));
    let dispatcher = Arc::new(ToolDispatcher::new(PluginConfiguration {
        model: ChatModel::new(provider.clone(), "gpt-4o", &[]),
        data_access: data.clone(),
        export: ExportConfig {
            templates_dir: templates.path().to_path_buf(),
            artifacts_base_url: "https://tb.example.org/artifacts".into(),
            ..ExportConfig::default()
        },
    }));
    let session = ChatSession::new(provider, "gpt-4o", dispatcher).with_transcripts(data.chat_context_accessor.clone());

    Fixture {
        store,
        data,
        session,
        _templates: templates,
    }
}

fn timeline_reply() -> Message {
    Message::assistant(
        serde_json::json!({
            "entries": [
                {
                    "date": "2023-01-04",
                    "title": "Biopsy",
                    "description": "Adenocarcinoma of the right upper lobe",
                    "sources": [{ "note_id": "n1", "sentences": ["CT-guided biopsy of the RUL mass shows adenocarcinoma."] }]
                },
                {
                    "date": "2023-02-10",
                    "title": "Molecular testing",
                    "description": "EGFR exon 19 deletion",
                    "sources": [{ "note_id": "n2", "sentences": ["EGFR exon 19 deletion detected."] }]
                }
            ]
        })
        .to_string(),
    )
}

fn summary_reply() -> Message {
    Message::assistant(
        serde_json::json!({
            "entries": ["Stage IIIA NSCLC", "EGFR exon 19 deletion", "Candidate for osimertinib"]
        })
        .to_string(),
    )
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_full_tumor_board_review() {
    let provider = ScriptedProvider::new(vec![
        tool_call("c1", "get_patient_data", serde_json::json!({ "patient_id": "p1" })),
        tool_call("c2", "create_patient_timeline", serde_json::json!({})),
        timeline_reply(),
        tool_call(
            "c3",
            "export_to_word_doc",
            serde_json::json!({
                "patient_initials": "J.D.",
                "patient_age": "64",
                "patient_dx": "NSCLC stage IIIA",
                "previous_treatment": ["Lobectomy"]
            }),
        ),
        summary_reply(),
        Message::assistant("The tumor board review for p1 is ready."),
    ]);
    let f = fixture(provider.clone()).await;

    let mut conv = Conversation::new();
    conv.push(Message::user("Prepare the tumor board review for patient p1."));
    let mut ctx = ChatContext::new(ConversationId::from("abc"));

    let reply = f.session.process(&mut conv, &mut ctx).await.unwrap();
    assert_eq!(reply, "The tumor board review for p1 is ready.");
    assert_eq!(provider.calls(), 6);
    assert_eq!(ctx.patient_id.as_deref(), Some("p1"));

    let timeline = f.store.read("patient-data", "abc/p1/patient_timeline.json").await.unwrap();
    let timeline: serde_json::Value = serde_json::from_slice(&timeline).unwrap();
    assert_eq!(timeline["entries"].as_array().unwrap().len(), 2);

    let url = "https://tb.example.org/artifacts/abc/p1/tumor_board_review-p1.docx";
    assert_eq!(ctx.display_blob_urls, vec![url.to_string()]);
    let tool_outputs: Vec<&Message> = conv.messages.iter().filter(|m| m.role == Role::Tool).collect();
    assert_eq!(tool_outputs.len(), 3);
    assert!(tool_outputs[2].content.contains(url));

    let doc = f
        .store
        .read("patient-data", "abc/p1/tumor_board_review-p1.docx")
        .await
        .unwrap();
    let xml = read_part(&doc, "word/document.xml").unwrap();
    assert!(xml.contains("J.D."));
    assert!(xml.contains("Candidate for osimertinib"));
    assert!(xml.contains("EGFR exon 19 deletion"));
    assert!(xml.contains("- Lobectomy"));

    let transcript = f.store.read("chat-contexts", "abc/chat_history.json").await.unwrap();
    let saved: Vec<Message> = serde_json::from_slice(&transcript).unwrap();
    assert_eq!(saved.len(), conv.messages.len());
}

#[tokio::test]
async fn e2e_export_before_patient_is_reported_and_recovered() {
    let provider = ScriptedProvider::new(vec![
        tool_call("c1", "export_to_word_doc", serde_json::json!({})),
        Message::assistant("Which patient should I use?"),
    ]);
    let f = fixture(provider.clone()).await;

    let mut conv = Conversation::new();
    conv.push(Message::user("Export the review."));
    let mut ctx = ChatContext::new(ConversationId::from("abc"));

    let reply = f.session.process(&mut conv, &mut ctx).await.unwrap();
    assert_eq!(reply, "Which patient should I use?");

    let tool_output = conv.messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_output.content.starts_with("Error:"), "{}", tool_output.content);
    assert!(ctx.display_blob_urls.is_empty());
    assert!(
        f.store
            .read("patient-data", "abc/p1/tumor_board_review-p1.docx")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn e2e_unknown_tool_is_fed_back_to_model() {
    let provider = ScriptedProvider::new(vec![
        tool_call("c1", "shell", serde_json::json!({ "command": "ls" })),
        Message::assistant("That tool is not available."),
    ]);
    let f = fixture(provider.clone()).await;

    let mut conv = Conversation::new();
    conv.push(Message::user("List files."));
    let mut ctx = ChatContext::new(ConversationId::from("abc"));

    let reply = f.session.process(&mut conv, &mut ctx).await.unwrap();
    assert_eq!(reply, "That tool is not available.");

    let second = &provider.requests.lock().unwrap()[1];
    let tool_output = second.messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_output.content.contains("shell"));
}

#[tokio::test]
async fn e2e_archived_conversation_no_longer_resolves() {
    let provider = ScriptedProvider::new(vec![
        tool_call("c1", "get_patient_data", serde_json::json!({ "patient_id": "p1" })),
        tool_call("c2", "create_patient_timeline", serde_json::json!({})),
        timeline_reply(),
        Message::assistant("Timeline created."),
    ]);
    let f = fixture(provider).await;

    let mut conv = Conversation::new();
    conv.push(Message::user("Build the timeline for p1."));
    let mut ctx = ChatContext::new(ConversationId::from("abc"));
    f.session.process(&mut conv, &mut ctx).await.unwrap();

    let accessor = &f.data.chat_artifact_accessor;
    let timeline = tumorboard_core::artifact::ArtifactIdentifier::new("abc", "p1", "patient_timeline.json");
    assert!(accessor.exists(&timeline).await);

    assert_eq!(accessor.archive("abc").await.unwrap(), 1);
    assert!(!accessor.exists(&timeline).await);
    assert!(!f.data.blob_sas_delegate.can_sign());
}
