//! Provider router: selects the chat-completion provider based on config.

use std::collections::HashMap;
use std::sync::Arc;
use tumorboard_core::provider::Provider;

use crate::azure_openai::AzureOpenAiProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }
}

/// Build providers from configuration.
pub fn build_from_config(config: &tumorboard_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for (name, provider_config) in &config.providers {
        let api_key = config.api_key_for(name).unwrap_or_default();
        let provider = make_provider(
            name,
            provider_config.api_url.as_deref(),
            &api_key,
            provider_config.api_version.as_deref(),
        );
        router.register(name.clone(), provider);
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let api_key = config.api_key.clone().unwrap_or_default();
        let provider = make_provider(&config.default_provider, None, &api_key, None);
        router.register(config.default_provider.clone(), provider);
    }

    router
}

fn make_provider(
    name: &str,
    api_url: Option<&str>,
    api_key: &str,
    api_version: Option<&str>,
) -> Arc<dyn Provider> {
    if name == "azure_openai" {
        let mut provider = AzureOpenAiProvider::new(api_url.unwrap_or_default(), api_key);
        if let Some(version) = api_version {
            provider = provider.with_api_version(version);
        }
        Arc::new(provider)
    } else {
        let base_url = api_url
            .map(str::to_string)
            .unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(name, base_url, api_key))
    }
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tumorboard_config::{AppConfig, ProviderConfig};

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_config_yields_azure_provider() {
        let router = build_from_config(&AppConfig::default());
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "azure_openai");
    }

    #[test]
    fn configured_providers_are_registered() {
        let mut config = AppConfig::default();
        config.default_provider = "openai".into();
        config.providers.insert(
            "openai".into(),
            toml::from_str::<ProviderConfig>("api_key = \"sk\"").unwrap(),
        );
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["openai"]);
        assert_eq!(router.default().unwrap().name(), "openai");
    }

    #[test]
    fn well_known_base_urls() {
        assert_eq!(default_base_url("openai"), "https://api.openai.com/v1");
        assert!(default_base_url("custom").contains("custom"));
    }
}
