//! Azure Storage credentials and SharedKey request signing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use tumorboard_core::error::StorageError;

/// How requests to the storage account are authorised.
#[derive(Clone)]
pub enum StorageCredential {
    /// Account name plus base64 account key; signs every request.
    SharedKey { account_name: String, account_key: String },
    /// A pre-issued SAS token appended to every request URL.
    Sas(String),
    /// An OAuth bearer token.
    Bearer(String),
    /// Public containers or local emulators with anonymous access.
    Anonymous,
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("account_key", &"[REDACTED]")
                .finish(),
            Self::Sas(_) => f.write_str("Sas([REDACTED])"),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

impl StorageCredential {
    /// Pick a credential from storage settings: shared key, then SAS, then bearer.
    pub fn from_config(config: &tumorboard_config::StorageConfig) -> Self {
        match (&config.account_name, &config.account_key) {
            (Some(account_name), Some(account_key)) => Self::SharedKey {
                account_name: account_name.clone(),
                account_key: account_key.clone(),
            },
            _ => match (&config.sas_token, &config.bearer_token) {
                (Some(sas), _) => Self::Sas(sas.trim_start_matches('?').to_string()),
                (None, Some(token)) => Self::Bearer(token.clone()),
                (None, None) => Self::Anonymous,
            },
        }
    }
}

/// HMAC-SHA256 over `message` with a base64-encoded key, base64-encoded.
pub(crate) fn hmac_sha256_b64(key_b64: &str, message: &str) -> Result<String, StorageError> {
    let key = STANDARD
        .decode(key_b64)
        .map_err(|e| StorageError::Authentication(format!("account key is not valid base64: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| StorageError::Authentication(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// The parts of a request that enter the SharedKey string-to-sign.
pub(crate) struct SignableRequest<'a> {
    pub method: &'a str,
    /// URI path exactly as sent (percent-encoded)
    pub encoded_path: &'a str,
    /// Decoded query parameters
    pub query: &'a [(String, String)],
    /// Lower-cased header names to values
    pub headers: &'a BTreeMap<String, String>,
}

impl SignableRequest<'_> {
    fn header(&self, name: &str) -> &str {
        self.headers.get(name).map(String::as_str).unwrap_or_default()
    }

    pub(crate) fn string_to_sign(&self, account_name: &str) -> String {
        // A zero length is signed as empty.
        let content_length = match self.header("content-length") {
            "0" => "",
            other => other,
        };

        let mut out = String::new();
        out.push_str(self.method);
        out.push('\n');
        for value in [
            self.header("content-encoding"),
            self.header("content-language"),
            content_length,
            self.header("content-md5"),
            self.header("content-type"),
            self.header("date"),
            self.header("if-modified-since"),
            self.header("if-match"),
            self.header("if-none-match"),
            self.header("if-unmodified-since"),
            self.header("range"),
        ] {
            out.push_str(value);
            out.push('\n');
        }

        for (name, value) in self.headers.range("x-ms-".to_string()..) {
            if !name.starts_with("x-ms-") {
                break;
            }
            out.push_str(name);
            out.push(':');
            out.push_str(value.trim());
            out.push('\n');
        }

        out.push('/');
        out.push_str(account_name);
        out.push_str(self.encoded_path);

        let mut params: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (name, value) in self.query {
            params.entry(name.to_ascii_lowercase()).or_default().push(value);
        }
        for (name, mut values) in params {
            values.sort_unstable();
            out.push('\n');
            out.push_str(&name);
            out.push(':');
            out.push_str(&values.join(","));
        }

        out
    }

    /// `Authorization` header value for this request.
    pub(crate) fn authorization(&self, account_name: &str, account_key: &str) -> Result<String, StorageError> {
        let signature = hmac_sha256_b64(account_key, &self.string_to_sign(account_name))?;
        Ok(format!("SharedKey {account_name}:{signature}"))
    }
}
