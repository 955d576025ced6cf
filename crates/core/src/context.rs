//! Per-session state.
//!
//! A [`ChatContext`] is created when a conversation starts, mutated by tool
//! invocations and dropped at the end. It is never persisted.

use serde::{Deserialize, Serialize};

use crate::clinical::ClinicalTrial;
use crate::message::ConversationId;

/// A loaded record: image metadata or a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DataItem {
    pub fn new(kind: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filename: filename.into(),
            url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatContext {
    conversation_id: ConversationId,
    pub patient_id: Option<String>,
    /// Records loaded for the current patient
    pub patient_data: Vec<DataItem>,
    /// Artifacts produced during this conversation
    pub output_data: Vec<DataItem>,
    pub display_clinical_trials: Vec<ClinicalTrial>,
    /// Links already shown to the user
    pub display_blob_urls: Vec<String>,
}

impl ChatContext {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation_id,
            patient_id: None,
            patient_data: Vec::new(),
            output_data: Vec::new(),
            display_clinical_trials: Vec::new(),
            display_blob_urls: Vec::new(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Select a patient. Switching to a different patient drops the previous
    /// patient's data, outputs and trials.
    pub fn set_patient(&mut self, patient_id: impl Into<String>) {
        let patient_id = patient_id.into();
        if self.patient_id.as_deref() == Some(patient_id.as_str()) {
            return;
        }
        self.patient_data.clear();
        self.output_data.clear();
        self.display_clinical_trials.clear();
        self.patient_id = Some(patient_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_patient_clears_patient_state() {
        let mut ctx = ChatContext::new(ConversationId::from("abc"));
        ctx.set_patient("p1");
        ctx.patient_data.push(DataItem::new("CT image", "ct1.png"));
        ctx.output_data.push(DataItem::new("x-ray image", "gen.png"));
        ctx.display_blob_urls.push("https://example.com/a".into());

        ctx.set_patient("p1");
        assert_eq!(ctx.patient_data.len(), 1);

        ctx.set_patient("p2");
        assert_eq!(ctx.patient_id.as_deref(), Some("p2"));
        assert!(ctx.patient_data.is_empty());
        assert!(ctx.output_data.is_empty());
        assert_eq!(ctx.display_blob_urls.len(), 1);
        assert_eq!(ctx.conversation_id().as_str(), "abc");
    }

    #[test]
    fn data_item_uses_type_key() {
        let item: DataItem =
            serde_json::from_str(r#"{"type":"pathology image","filename":"slide.png"}"#).unwrap();
        assert_eq!(item.kind, "pathology image");
        assert!(item.url.is_none());
    }
}
