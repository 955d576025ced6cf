//! Artifact identity and payloads.
//!
//! An artifact is a blob produced during a conversation (a patient timeline,
//! a research paper list, the exported review document). It is addressed by
//! the triple `(conversation_id, patient_id, filename)`; two identifiers with
//! equal triples denote the same stored object.

use serde::{Deserialize, Serialize};

/// Unique address of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentifier {
    pub conversation_id: String,
    pub patient_id: String,
    pub filename: String,
}

impl ArtifactIdentifier {
    pub fn new(
        conversation_id: impl Into<String>,
        patient_id: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            patient_id: patient_id.into(),
            filename: filename.into(),
        }
    }
}

/// Well-known artifact filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatArtifactFilename {
    PatientDataAnswers,
    PatientTimeline,
    ResearchPapers,
    /// The exported Word document for a patient
    TumorBoardReview(String),
    /// Caller-supplied name, e.g. a generated image
    Other(String),
}

impl ChatArtifactFilename {
    pub fn filename(&self) -> String {
        match self {
            Self::PatientDataAnswers => "patient_data_answers.json".into(),
            Self::PatientTimeline => "patient_timeline.json".into(),
            Self::ResearchPapers => "research_papers.json".into(),
            Self::TumorBoardReview(patient_id) => format!("tumor_board_review-{patient_id}.docx"),
            Self::Other(name) => name.clone(),
        }
    }
}

impl std::fmt::Display for ChatArtifactFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.filename())
    }
}

/// Filename of the Word template with the given id.
pub fn template_filename(template_id: u32) -> String {
    format!("tumor_board_template{template_id}.docx")
}

/// An identifier plus its byte payload. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatArtifact {
    id: ArtifactIdentifier,
    data: Vec<u8>,
}

impl ChatArtifact {
    pub fn new(id: ArtifactIdentifier, data: Vec<u8>) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> &ArtifactIdentifier {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn well_known_filenames() {
        assert_eq!(ChatArtifactFilename::PatientTimeline.filename(), "patient_timeline.json");
        assert_eq!(ChatArtifactFilename::ResearchPapers.filename(), "research_papers.json");
        assert_eq!(
            ChatArtifactFilename::PatientDataAnswers.filename(),
            "patient_data_answers.json"
        );
        assert_eq!(
            ChatArtifactFilename::TumorBoardReview("p1".into()).to_string(),
            "tumor_board_review-p1.docx"
        );
        assert_eq!(template_filename(2), "tumor_board_template2.docx");
    }

    #[test]
    fn equal_triples_are_the_same_identifier() {
        let a = ArtifactIdentifier::new("abc", "p1", "patient_timeline.json");
        let b = ArtifactIdentifier::new("abc", "p1", "patient_timeline.json");
        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        assert!(set.insert(ArtifactIdentifier::new("abc", "p2", "patient_timeline.json")));
    }
}
