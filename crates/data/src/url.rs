//! Retrieval links handed to the user for stored artifacts.

use reqwest::Url;

#[derive(Debug, Clone)]
pub struct ArtifactUrlBuilder {
    base_url: String,
    parsed: Option<Url>,
}

impl ArtifactUrlBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).ok().filter(|url| !url.cannot_be_a_base());
        if parsed.is_none() {
            tracing::warn!(base_url = %base_url, "Artifact base URL is not absolute, links are joined verbatim");
        }
        Self { base_url, parsed }
    }

    /// `{base_url}/{blob_path}`, each path segment percent-encoded so the
    /// link resolves to exactly `blob_path` in the store.
    pub fn url_for(&self, blob_path: &str) -> String {
        let blob_path = blob_path.trim_start_matches('/');
        let Some(mut url) = self.parsed.clone() else {
            return format!("{}/{}", self.base_url, blob_path);
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(blob_path.split('/'));
        }
        url.to_string()
    }
}
