//! Configuration loading, validation, and management for the tumor board
//! orchestrator.
//!
//! Loads configuration from `~/.tumorboard/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tumorboard/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the default provider (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default chat-completion provider ("azure_openai" or any OpenAI-compatible name)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model, or deployment name for Azure OpenAI
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_provider() -> String {
    "azure_openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("providers", &self.providers)
            .field("models", &self.models)
            .field("storage", &self.storage)
            .field("export", &self.export)
            .field("agent", &self.agent)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (OpenAI-compatible) or resource endpoint (Azure OpenAI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Azure OpenAI REST API version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Model capability overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Models (or deployment names) that reject an explicit temperature,
    /// in addition to the built-in reasoning model families.
    #[serde(default)]
    pub no_temperature: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Azure Blob Storage over REST
    Azure,
    /// A directory tree on the local filesystem
    Local,
    /// Process memory; lost on exit
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,

    /// e.g. `https://myaccount.blob.core.windows.net`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,

    /// Base64 shared key; enables SAS URL generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Root directory for the local backend (default: `~/.tumorboard/blobs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_root: Option<PathBuf>,

    #[serde(default = "default_patient_data_container")]
    pub patient_data_container: String,

    #[serde(default = "default_chat_context_container")]
    pub chat_context_container: String,
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Local
}
fn default_patient_data_container() -> String {
    "patient-data".into()
}
fn default_chat_context_container() -> String {
    "chat-contexts".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            account_url: None,
            account_name: None,
            account_key: None,
            sas_token: None,
            bearer_token: None,
            local_root: None,
            patient_data_container: default_patient_data_container(),
            chat_context_container: default_chat_context_container(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("account_url", &self.account_url)
            .field("account_name", &self.account_name)
            .field("account_key", &redact(&self.account_key))
            .field("sas_token", &redact(&self.sas_token))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("local_root", &self.local_root)
            .field("patient_data_container", &self.patient_data_container)
            .field("chat_context_container", &self.chat_context_container)
            .finish()
    }
}

impl StorageConfig {
    /// Apply an Azure Storage connection string
    /// (`AccountName=..;AccountKey=..;EndpointSuffix=..` or
    /// `BlobEndpoint=..;SharedAccessSignature=..`). Selects the Azure backend.
    pub fn apply_connection_string(&mut self, conn: &str) -> Result<(), ConfigError> {
        let mut parts: HashMap<String, String> = HashMap::new();
        for pair in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ConfigError::ValidationError(format!("malformed connection string segment '{pair}'"))
            })?;
            parts.insert(key.to_ascii_lowercase(), value.to_string());
        }

        let protocol = parts
            .get("defaultendpointsprotocol")
            .map(String::as_str)
            .unwrap_or("https");
        let suffix = parts
            .get("endpointsuffix")
            .map(String::as_str)
            .unwrap_or("core.windows.net");

        if let Some(name) = parts.get("accountname") {
            self.account_name = Some(name.clone());
        }
        if let Some(key) = parts.get("accountkey") {
            self.account_key = Some(key.clone());
        }
        if let Some(sas) = parts.get("sharedaccesssignature") {
            self.sas_token = Some(sas.clone());
        }

        self.account_url = match (parts.get("blobendpoint"), &self.account_name) {
            (Some(endpoint), _) => Some(endpoint.trim_end_matches('/').to_string()),
            (None, Some(name)) => Some(format!("{protocol}://{name}.blob.{suffix}")),
            (None, None) => {
                return Err(ConfigError::ValidationError(
                    "connection string has neither AccountName nor BlobEndpoint".into(),
                ));
            }
        };
        self.backend = StorageBackend::Azure;
        Ok(())
    }

    /// Local backend root, defaulting under the config directory.
    pub fn local_root(&self) -> PathBuf {
        self.local_root
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("blobs"))
    }
}

/// Which enrichment sections the export inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSections {
    #[serde(default = "default_true")]
    pub clinical_summary: bool,
    #[serde(default = "default_true")]
    pub clinical_timeline: bool,
    #[serde(default = "default_true")]
    pub clinical_trials: bool,
    #[serde(default = "default_true")]
    pub research_papers: bool,
    #[serde(default = "default_true")]
    pub timeline_images: bool,
    #[serde(default = "default_true")]
    pub radiology_images: bool,
    #[serde(default = "default_true")]
    pub pathology_images: bool,
}

impl Default for ExportSections {
    fn default() -> Self {
        Self {
            clinical_summary: true,
            clinical_timeline: true,
            clinical_trials: true,
            research_papers: true,
            timeline_images: true,
            radiology_images: true,
            pathology_images: true,
        }
    }
}

impl ExportSections {
    pub fn needs_timeline(&self) -> bool {
        self.clinical_summary || self.clinical_timeline || self.timeline_images
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory holding `tumor_board_template{id}.docx` files
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    #[serde(default = "default_template_id")]
    pub default_template_id: u32,

    /// Prefix of the download link handed to the user
    #[serde(default = "default_artifacts_base_url")]
    pub artifacts_base_url: String,

    #[serde(default = "default_summary_max_entries")]
    pub summary_max_entries: usize,

    #[serde(default = "default_image_height_inches")]
    pub image_height_inches: f64,

    #[serde(default)]
    pub sections: ExportSections,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}
fn default_template_id() -> u32 {
    2
}
fn default_artifacts_base_url() -> String {
    "https://example.com/artifacts".into()
}
fn default_summary_max_entries() -> usize {
    6
}
fn default_image_height_inches() -> f64 {
    1.7
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            default_template_id: default_template_id(),
            artifacts_base_url: default_artifacts_base_url(),
            summary_max_entries: default_summary_max_entries(),
            image_height_inches: default_image_height_inches(),
            sections: ExportSections::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model round trips per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Override the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> usize {
    10
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tumorboard/config.toml),
    /// then apply environment overrides. A `.env` file in the working
    /// directory is honoured if present.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Recognised keys:
    /// - `AZURE_DEPLOYMENT_NAME`, `AZURE_DEPLOYMENT_KEY`, `AZURE_DEPLOYMENT_ENDPOINT`
    /// - `AZURE_STORAGE_CONNECTION_STRING`, `STORAGE_ACCOUNT_URL`
    /// - `TUMORBOARD_API_KEY`, `TUMORBOARD_PROVIDER`, `TUMORBOARD_MODEL`,
    ///   `TUMORBOARD_TEMPLATES_DIR`, `TUMORBOARD_ARTIFACTS_BASE_URL`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(provider) = lookup("TUMORBOARD_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(deployment) = lookup("AZURE_DEPLOYMENT_NAME") {
            self.default_model = deployment;
        }
        if let Some(model) = lookup("TUMORBOARD_MODEL") {
            self.default_model = model;
        }

        if let Some(endpoint) = lookup("AZURE_DEPLOYMENT_ENDPOINT") {
            self.providers
                .entry("azure_openai".into())
                .or_insert_with(ProviderConfig::empty)
                .api_url = Some(endpoint);
        }
        if let Some(key) = lookup("AZURE_DEPLOYMENT_KEY") {
            self.providers
                .entry("azure_openai".into())
                .or_insert_with(ProviderConfig::empty)
                .api_key = Some(key);
        }

        if self.api_key.is_none() {
            self.api_key = lookup("TUMORBOARD_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(conn) = lookup("AZURE_STORAGE_CONNECTION_STRING") {
            self.storage.apply_connection_string(&conn)?;
        }
        if let Some(url) = lookup("STORAGE_ACCOUNT_URL") {
            self.storage.account_url = Some(url.trim_end_matches('/').to_string());
            self.storage.backend = StorageBackend::Azure;
        }

        if let Some(dir) = lookup("TUMORBOARD_TEMPLATES_DIR") {
            self.export.templates_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("TUMORBOARD_ARTIFACTS_BASE_URL") {
            self.export.artifacts_base_url = url;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tumorboard")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.export.summary_max_entries == 0 {
            return Err(ConfigError::ValidationError(
                "export.summary_max_entries must be at least 1".into(),
            ));
        }

        if self.export.image_height_inches <= 0.0 {
            return Err(ConfigError::ValidationError(
                "export.image_height_inches must be > 0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.storage.backend == StorageBackend::Azure
            && self.storage.account_url.is_none()
            && self.storage.account_name.is_none()
        {
            return Err(ConfigError::ValidationError(
                "azure storage needs account_url or account_name".into(),
            ));
        }

        Ok(())
    }

    /// Resolved API key for a provider: per-provider key, then the global one.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl ProviderConfig {
    fn empty() -> Self {
        Self {
            api_key: None,
            api_url: None,
            default_model: None,
            api_version: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_max_tokens: default_max_tokens(),
            providers: HashMap::new(),
            models: ModelsConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
