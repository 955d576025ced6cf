//! Azure OpenAI provider.
//!
//! Requests go to `{endpoint}/openai/deployments/{deployment}/chat/completions`
//! with an `api-key` header. The deployment, not the body, selects the model.

use async_trait::async_trait;
use tracing::debug;
use tumorboard_core::error::ProviderError;
use tumorboard_core::provider::{ProviderRequest, ProviderResponse};

use crate::openai_compat::{build_body, http_client, read_response};

pub const DEFAULT_API_VERSION: &str = "2024-10-21";

pub struct AzureOpenAiProvider {
    endpoint: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.into(),
            client: http_client(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Chat-completions URL for a deployment.
    pub fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }
}

#[async_trait]
impl tumorboard_core::Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure_openai"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if self.endpoint.is_empty() {
            return Err(ProviderError::NotConfigured(
                "Azure OpenAI endpoint is not set (AZURE_DEPLOYMENT_ENDPOINT)".into(),
            ));
        }

        let url = self.completions_url(&request.model);
        let body = build_body(&request, false);

        debug!(deployment = %request.model, "Sending Azure OpenAI completion request");

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        read_response("azure_openai", response, &request.model).await
    }
}
