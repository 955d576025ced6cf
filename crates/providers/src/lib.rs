//! Chat-completion provider implementations for the tumor board orchestrator.
//!
//! All providers implement the `tumorboard_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod azure_openai;
pub mod capabilities;
pub mod chat_model;
pub mod openai_compat;
pub mod router;

pub use azure_openai::AzureOpenAiProvider;
pub use capabilities::model_supports_temperature;
pub use chat_model::ChatModel;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, ProviderRouter};
