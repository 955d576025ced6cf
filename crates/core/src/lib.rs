//! # Tumor Board Core
//!
//! Domain types, traits, and error definitions for the tumor board
//! orchestrator. Every collaborator the workflow talks to (the chat-completion
//! service, the blob store) is a trait here; implementations live in their
//! own crates and are injected at startup.
//!
//! ## Layout
//!
//! - [`artifact`]: artifact identity and payloads persisted per conversation
//! - [`context`]: per-session state owned by the session driver
//! - [`clinical`]: patient timeline, clinical summary, trials and papers
//! - [`storage`]: the object-store contract
//! - [`provider`]: the chat-completion contract

pub mod artifact;
pub mod clinical;
pub mod context;
pub mod error;
pub mod message;
pub mod provider;
pub mod storage;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use artifact::{template_filename, ArtifactIdentifier, ChatArtifact, ChatArtifactFilename};
pub use clinical::{
    ClinicalHistoryItem, ClinicalSummary, ClinicalTrial, PatientDataAnswer, PatientDataSource,
    PatientTimeline, PatientTimelineEntry, ResearchPaper, TimelineRow,
};
pub use context::{ChatContext, DataItem};
pub use error::{Error, ExportError, ProviderError, Result, StorageError, ToolError};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseFormat, ToolDefinition, Usage};
pub use storage::BlobStore;
pub use tool::{ToolCall, ToolResult};
