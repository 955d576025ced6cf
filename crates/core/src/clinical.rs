//! Clinical data model: timelines, summaries, trials and papers.

use serde::{Deserialize, Serialize};

/// Where a statement came from: a clinical note and the supporting sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDataSource {
    pub note_id: String,
    #[serde(default)]
    pub sentences: Vec<String>,
}

/// A free-text answer about a patient with its supporting sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDataAnswer {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<PatientDataSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientTimelineEntry {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sources: Vec<PatientDataSource>,
}

/// Summarization input row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicalHistoryItem {
    pub date: String,
    pub title: String,
    pub description: String,
}

/// One row of the exported timeline table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineRow {
    pub date: String,
    pub note_title: String,
    pub note_summary: String,
    pub note_type: String,
}

/// Empty strings count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl PatientTimelineEntry {
    pub fn to_history_item(&self) -> ClinicalHistoryItem {
        ClinicalHistoryItem {
            date: present(&self.date).unwrap_or("Not provided").to_string(),
            title: present(&self.title).unwrap_or("Untitled").to_string(),
            description: present(&self.description)
                .unwrap_or("No description available.")
                .to_string(),
        }
    }

    pub fn to_timeline_row(&self) -> TimelineRow {
        TimelineRow {
            date: present(&self.date).unwrap_or("yyyy-mm-dd").to_string(),
            note_title: present(&self.title).unwrap_or("Unspecified").to_string(),
            note_summary: present(&self.description)
                .unwrap_or("No content available.")
                .to_string(),
            note_type: present(&self.title).unwrap_or_default().to_string(),
        }
    }
}

/// Chronological record of a patient's clinical events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientTimeline {
    pub patient_id: String,
    #[serde(default)]
    pub entries: Vec<PatientTimelineEntry>,
}

impl PatientTimeline {
    pub fn clinical_history(&self) -> Vec<ClinicalHistoryItem> {
        self.entries.iter().map(PatientTimelineEntry::to_history_item).collect()
    }

    pub fn timeline_rows(&self) -> Vec<TimelineRow> {
        self.entries.iter().map(PatientTimelineEntry::to_timeline_row).collect()
    }
}

/// Bulleted summary produced by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalSummary {
    pub entries: Vec<String>,
}

impl ClinicalSummary {
    pub fn truncate(&mut self, max_entries: usize) {
        self.entries.truncate(max_entries);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub title: String,
    pub summary: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPaper {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub authors: String,
}
