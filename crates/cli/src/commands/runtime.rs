//! Wiring shared by the commands that talk to the model and the store.

use std::sync::Arc;
use tumorboard_agent::ChatSession;
use tumorboard_config::AppConfig;
use tumorboard_core::provider::Provider;
use tumorboard_data::{create_data_access, ContainerNames, DataAccess};
use tumorboard_providers::ChatModel;
use tumorboard_tools::{PluginConfiguration, ToolDispatcher};

pub struct Runtime {
    pub provider: Arc<dyn Provider>,
    pub data_access: Arc<DataAccess>,
    pub dispatcher: Arc<ToolDispatcher>,
}

impl Runtime {
    pub fn build(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = tumorboard_providers::build_from_config(config);
        let provider = router.default().ok_or("No default provider configured")?;

        let (store, credential) = tumorboard_storage::build_from_config(&config.storage)
            .map_err(|e| format!("Failed to open blob storage: {e}"))?;
        let data_access = Arc::new(create_data_access(
            store,
            credential,
            &ContainerNames::from(&config.storage),
        ));

        let model = ChatModel::new(provider.clone(), &config.default_model, &config.models.no_temperature);
        tracing::debug!(?model, "Chat model resolved");
        let dispatcher = Arc::new(ToolDispatcher::new(PluginConfiguration {
            model,
            data_access: data_access.clone(),
            export: config.export.clone(),
        }));

        Ok(Self {
            provider,
            data_access,
            dispatcher,
        })
    }

    pub fn session(&self, config: &AppConfig) -> ChatSession {
        let mut session = ChatSession::new(self.provider.clone(), &config.default_model, self.dispatcher.clone())
            .with_max_iterations(config.agent.max_iterations)
            .with_max_tokens(config.default_max_tokens)
            .with_transcripts(self.data_access.chat_context_accessor.clone());
        if let Some(prompt) = &config.agent.system_prompt {
            session = session.with_system_prompt(prompt);
        }
        session
    }
}
