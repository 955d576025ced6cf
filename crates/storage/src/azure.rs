//! Azure Blob Storage over the REST API.
//!
//! Implements the handful of operations the orchestrator needs (Get Blob,
//! Put Blob, Get Blob Properties, List Blobs, Delete Blob) directly with
//! `reqwest`, authorised by a [`StorageCredential`].

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, StatusCode, Url};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

use crate::credential::{SignableRequest, StorageCredential};

pub const API_VERSION: &str = "2021-08-06";

static BLOB_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Blob>\s*<Name>([^<]*)</Name>").expect("static regex"));
static NEXT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<NextMarker>([^<]*)</NextMarker>").expect("static regex"));

pub struct AzureBlobStore {
    account_url: Url,
    credential: StorageCredential,
    client: reqwest::Client,
}

impl AzureBlobStore {
    /// `account_url` is the blob endpoint, e.g. `https://acct.blob.core.windows.net`.
    pub fn new(account_url: &str, credential: StorageCredential) -> Result<Self, StorageError> {
        let account_url = Url::parse(account_url.trim_end_matches('/'))
            .map_err(|e| StorageError::InvalidPath(format!("account url '{account_url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(Self {
            account_url,
            credential,
            client,
        })
    }

    pub fn credential(&self) -> &StorageCredential {
        &self.credential
    }

    /// URL of a container or blob, without any query string.
    pub(crate) fn resource_url(&self, container: &str, path: Option<&str>) -> Result<Url, StorageError> {
        let mut url = self.account_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidPath(self.account_url.to_string()))?;
            segments.pop_if_empty().push(container);
            if let Some(path) = path {
                segments.extend(path.split('/'));
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        mut url: Url,
        mut headers: BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, StorageError> {
        headers.insert("x-ms-version".into(), API_VERSION.into());
        headers.insert(
            "x-ms-date".into(),
            chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        let length = body.as_ref().map(Vec::len).unwrap_or(0);
        if method == Method::PUT {
            headers.insert("content-length".into(), length.to_string());
        }

        match &self.credential {
            StorageCredential::SharedKey {
                account_name,
                account_key,
            } => {
                let query: Vec<(String, String)> = url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let signable = SignableRequest {
                    method: method.as_str(),
                    encoded_path: url.path(),
                    query: &query,
                    headers: &headers,
                };
                let auth = signable.authorization(account_name, account_key)?;
                headers.insert("authorization".into(), auth);
            }
            StorageCredential::Sas(token) => {
                let query = match url.query() {
                    Some(q) => format!("{q}&{token}"),
                    None => token.clone(),
                };
                url.set_query(Some(&query));
            }
            StorageCredential::Bearer(token) => {
                headers.insert("authorization".into(), format!("Bearer {token}"));
            }
            StorageCredential::Anonymous => {}
        }

        let mut request = self.client.request(method.clone(), url.clone());
        // reqwest derives the length from the body; it is only signed here.
        for (name, value) in headers.iter().filter(|(name, _)| *name != "content-length") {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(method = %method, url = %strip_query(&url), "Blob request");
        request
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))
    }
}

fn strip_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Classify a non-success status.
async fn status_error(response: reqwest::Response, container: &str, path: &str) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => StorageError::not_found(container, path),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::Authentication(format!("{status}: {}", first_line(&body)))
        }
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => StorageError::AlreadyExists {
            container: container.into(),
            path: path.into(),
        },
        _ => {
            warn!(status = status.as_u16(), container, path, "Blob service error");
            StorageError::Transport(format!("{status}: {}", first_line(&body)))
        }
    }
}

fn first_line(body: &str) -> &str {
    body.lines().next().unwrap_or_default()
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Blob names and the continuation marker from one List Blobs page.
pub(crate) fn parse_list_page(xml: &str) -> (Vec<String>, Option<String>) {
    let names = BLOB_NAME
        .captures_iter(xml)
        .map(|c| unescape_xml(&c[1]))
        .collect();
    let marker = NEXT_MARKER
        .captures(xml)
        .map(|c| unescape_xml(&c[1]))
        .filter(|m| !m.is_empty());
    (names, marker)
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn read(&self, container: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.resource_url(container, Some(path))?;
        let response = self.send(Method::GET, url, BTreeMap::new(), None).await?;
        if !response.status().is_success() {
            return Err(status_error(response, container, path).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn write(
        &self,
        container: &str,
        path: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), StorageError> {
        let url = self.resource_url(container, Some(path))?;
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-blob-type".to_string(), "BlockBlob".to_string());
        headers.insert("content-type".to_string(), "application/octet-stream".to_string());
        if !overwrite {
            headers.insert("if-none-match".to_string(), "*".to_string());
        }
        let response = self.send(Method::PUT, url, headers, Some(data)).await?;
        if !response.status().is_success() {
            return Err(status_error(response, container, path).await);
        }
        Ok(())
    }

    async fn exists(&self, container: &str, path: &str) -> Result<bool, StorageError> {
        let url = self.resource_url(container, Some(path))?;
        let response = self.send(Method::HEAD, url, BTreeMap::new(), None).await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response, container, path).await),
        }
    }

    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.resource_url(container, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("restype", "container").append_pair("comp", "list");
                if !prefix.is_empty() {
                    query.append_pair("prefix", prefix);
                }
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }

            let response = self.send(Method::GET, url, BTreeMap::new(), None).await?;
            if !response.status().is_success() {
                return Err(status_error(response, container, prefix).await);
            }
            let xml = response
                .text()
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;

            let (page, next) = parse_list_page(&xml);
            names.extend(page);
            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        names.sort();
        Ok(names)
    }

    async fn delete(&self, container: &str, path: &str) -> Result<(), StorageError> {
        let url = self.resource_url(container, Some(path))?;
        let response = self.send(Method::DELETE, url, BTreeMap::new(), None).await?;
        if !response.status().is_success() {
            return Err(status_error(response, container, path).await);
        }
        Ok(())
    }

    fn url(&self, container: &str, path: &str) -> String {
        self.resource_url(container, Some(path))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}/{container}/{path}", self.account_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AzureBlobStore {
        AzureBlobStore::new("https://acct.blob.core.windows.net/", StorageCredential::Anonymous).unwrap()
    }

    #[test]
    fn blob_urls_encode_segments() {
        let store = store();
        assert_eq!(
            store.url("patient-data", "abc/p1/tumor_board_review-p1.docx"),
            "https://acct.blob.core.windows.net/patient-data/abc/p1/tumor_board_review-p1.docx"
        );
        // An escaped slash inside a segment stays inside that segment.
        assert_eq!(
            store.url("patient-data", "a%2Fb/p1/x.json"),
            "https://acct.blob.core.windows.net/patient-data/a%252Fb/p1/x.json"
        );
    }

    #[test]
    fn emulator_style_account_path_is_kept() {
        let store =
            AzureBlobStore::new("http://127.0.0.1:10000/devstoreaccount1", StorageCredential::Anonymous)
                .unwrap();
        assert_eq!(
            store.url("chat-contexts", "abc/chat_history.json"),
            "http://127.0.0.1:10000/devstoreaccount1/chat-contexts/abc/chat_history.json"
        );
    }

    #[test]
    fn invalid_account_url_rejected() {
        assert!(matches!(
            AzureBlobStore::new("not a url", StorageCredential::Anonymous),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn list_page_parsing() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ContainerName="patient-data">
  <Prefix>p1/</Prefix>
  <Blobs>
    <Blob><Name>p1/clinical_notes/n1.json</Name><Properties/></Blob>
    <Blob>
      <Name>p1/clinical_notes/a&amp;b.json</Name>
    </Blob>
  </Blobs>
  <NextMarker>2!abc</NextMarker>
</EnumerationResults>"#;
        let (names, marker) = parse_list_page(xml);
        assert_eq!(names, vec!["p1/clinical_notes/n1.json", "p1/clinical_notes/a&b.json"]);
        assert_eq!(marker.as_deref(), Some("2!abc"));

        let (names, marker) = parse_list_page("<EnumerationResults><Blobs/><NextMarker /></EnumerationResults>");
        assert!(names.is_empty());
        assert!(marker.is_none());
    }
}
