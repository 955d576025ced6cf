//! Error types for the tumor board domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] aggregates them
//! for callers that only need to surface a message.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all orchestrator operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the object store collaborator.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The blob does not exist. Callers decide whether this is fatal.
    #[error("Blob not found: {container}/{path}")]
    NotFound { container: String, path: String },

    #[error("Blob already exists: {container}/{path}")]
    AlreadyExists { container: String, path: String },

    /// Network or service failure talking to the store.
    #[error("Storage transport error: {0}")]
    Transport(String),

    #[error("Storage authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl StorageError {
    pub fn not_found(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            container: container.into(),
            path: path.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures of the document export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No patient is selected in this conversation")]
    NoPatientSelected,

    #[error("Template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid artifact {filename}: {reason}")]
    InvalidArtifact { filename: String, reason: String },

    /// The model's structured response did not match the expected schema.
    #[error("Clinical summary response is malformed: {0}")]
    Summary(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
