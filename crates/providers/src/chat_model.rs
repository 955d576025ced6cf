//! A provider bound to one model, with its temperature capability resolved.

use std::sync::Arc;
use tracing::debug;
use tumorboard_core::error::ProviderError;
use tumorboard_core::message::Message;
use tumorboard_core::provider::{Provider, ProviderRequest, ResponseFormat};

use crate::capabilities::model_supports_temperature;

#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn Provider>,
    model: String,
    supports_temperature: bool,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, no_temperature: &[String]) -> Self {
        let model = model.into();
        let supports_temperature = model_supports_temperature(&model, no_temperature);
        Self {
            provider,
            model,
            supports_temperature,
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn supports_temperature(&self) -> bool {
        self.supports_temperature
    }

    /// `Some(value)` if the model accepts a temperature, else `None`.
    pub fn temperature(&self, value: f32) -> Option<f32> {
        if self.supports_temperature {
            Some(value)
        } else {
            debug!(model = %self.model, "Model does not support temperature, omitting it");
            None
        }
    }

    /// One deterministic, schema-constrained completion. Returns the reply text.
    pub async fn complete_structured(
        &self,
        messages: Vec<Message>,
        format: ResponseFormat,
    ) -> Result<String, ProviderError> {
        let mut request = ProviderRequest::new(&self.model, messages);
        request.temperature = self.temperature(0.0);
        request.response_format = Some(format);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("supports_temperature", &self.supports_temperature)
            .finish()
    }
}
