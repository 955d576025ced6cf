//! Tools the model can call during a tumor board conversation.
//!
//! The set is closed: [`Command`] decodes a tool call and [`ToolDispatcher`]
//! runs it against the session's [`ChatContext`](tumorboard_core::context::ChatContext).
//! Failures come back as [`ToolError`](tumorboard_core::error::ToolError) so the
//! session can report them to the model as tool output.

pub mod command;
pub mod patient_data;
pub mod patient_timeline;

pub use command::{Command, ToolDispatcher};

use std::sync::Arc;
use tumorboard_config::ExportConfig;
use tumorboard_data::DataAccess;
use tumorboard_providers::ChatModel;

/// Shared collaborators handed to every tool invocation.
#[derive(Clone)]
pub struct PluginConfiguration {
    pub model: ChatModel,
    pub data_access: Arc<DataAccess>,
    pub export: ExportConfig,
}
