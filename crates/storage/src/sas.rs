//! Time-limited read URLs for individual blobs (service SAS).

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use std::sync::Arc;
use tracing::info;
use tumorboard_core::error::StorageError;
use tumorboard_core::storage::BlobStore;

use crate::azure::API_VERSION;
use crate::credential::{hmac_sha256_b64, StorageCredential};

/// Issues read-only SAS URLs for blobs when the account key is available.
#[derive(Clone)]
pub struct BlobSasDelegate {
    store: Arc<dyn BlobStore>,
    credential: StorageCredential,
    expiry: Duration,
}

impl std::fmt::Debug for BlobSasDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobSasDelegate")
            .field("credential", &self.credential)
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl BlobSasDelegate {
    pub fn new(store: Arc<dyn BlobStore>, credential: StorageCredential) -> Self {
        Self {
            store,
            credential,
            expiry: Duration::minutes(30),
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn can_sign(&self) -> bool {
        matches!(self.credential, StorageCredential::SharedKey { .. })
    }

    /// Read-only URL for `container/path`, valid from a few minutes ago until
    /// the configured expiry.
    pub fn get_blob_sas_url(&self, container: &str, path: &str) -> Result<String, StorageError> {
        self.sas_url_at(container, path, Utc::now())
    }

    fn sas_url_at(&self, container: &str, path: &str, now: DateTime<Utc>) -> Result<String, StorageError> {
        let StorageCredential::SharedKey {
            account_name,
            account_key,
        } = &self.credential
        else {
            return Err(StorageError::Authentication(
                "SAS URLs require a shared key credential".into(),
            ));
        };

        let start = (now - Duration::minutes(3)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let expiry = (now + self.expiry).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let resource = format!("/blob/{account_name}/{container}/{path}");

        let string_to_sign = [
            "r",
            start.as_str(),
            expiry.as_str(),
            resource.as_str(),
            "",
            "",
            "https",
            API_VERSION,
            "b",
            "",
            "",
            "",
            "",
            "",
            "",
            "",
        ]
        .join("\n");
        let signature = hmac_sha256_b64(account_key, &string_to_sign)?;

        let blob_url = self.store.url(container, path);
        let mut url = Url::parse(&blob_url)
            .map_err(|e| StorageError::InvalidPath(format!("blob url '{blob_url}': {e}")))?;
        if url.query().is_some() {
            return Err(StorageError::InvalidPath(format!(
                "blob url '{blob_url}' already has a query string"
            )));
        }
        url.query_pairs_mut()
            .append_pair("sp", "r")
            .append_pair("st", &start)
            .append_pair("se", &expiry)
            .append_pair("spr", "https")
            .append_pair("sv", API_VERSION)
            .append_pair("sr", "b")
            .append_pair("sig", &signature);

        info!(container, path, "Issued blob SAS url");
        Ok(url.to_string())
    }
}
