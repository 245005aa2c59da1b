//! Object storage for generated bitmaps.
//!
//! Keys are relative paths such as `{content_id}/{slide_index}-{timestamp}.png`.
//! They must not contain `..` or start with `/`; every backend validates the
//! same way.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

pub trait ObjectStorage: Send + Sync {
    fn name(&self) -> &str;

    /// Stores `data` under `key`, replacing any previous object, and returns
    /// its public URL.
    fn upload(&self, key: &str, content_type: &str, data: Vec<u8>) -> StorageResult<String>;
}

pub fn build_storage(config: &StorageConfig, timeout: Duration) -> Box<dyn ObjectStorage> {
    match config {
        StorageConfig::Local {
            root,
            public_base_url,
        } => Box::new(LocalObjectStorage::new(root.clone(), public_base_url.clone())),
        StorageConfig::Http {
            base_url,
            bucket,
            service_key,
        } => Box::new(HttpObjectStorage::new(
            base_url.clone(),
            bucket.clone(),
            service_key.clone(),
            timeout,
        )),
    }
}

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "'{key}' escapes the storage root"
        )));
    }
    Ok(())
}

/// Filesystem-backed storage serving files under a public base URL.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn name(&self) -> &str {
        "local"
    }

    fn upload(&self, key: &str, _content_type: &str, data: Vec<u8>) -> StorageResult<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let size = data.len();
        fs::write(&path, data).map_err(|err| {
            StorageError::UploadFailed(format!("failed to write {}: {err}", path.display()))
        })?;
        tracing::info!(key, size_bytes = size, path = %path.display(), "stored object locally");
        Ok(self.public_url(key))
    }
}

/// Bucket storage reached over HTTP with a service key.
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    base_url: String,
    bucket: String,
    service_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl HttpObjectStorage {
    pub fn new(base_url: String, bucket: String, service_key: String, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket,
            service_key,
            timeout,
            http: HttpClient::new(),
        }
    }

    pub fn object_endpoint(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

impl ObjectStorage for HttpObjectStorage {
    fn name(&self) -> &str {
        "http"
    }

    fn upload(&self, key: &str, content_type: &str, data: Vec<u8>) -> StorageResult<String> {
        validate_key(key)?;
        let endpoint = self.object_endpoint(key);
        let response = self
            .http
            .post(&endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .timeout(self.timeout)
            .body(data)
            .send()
            .map_err(|err| StorageError::UploadFailed(format!("{endpoint}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StorageError::UploadFailed(format!(
                "{endpoint} answered {}: {}",
                status.as_u16(),
                body.chars().take(256).collect::<String>()
            )));
        }
        tracing::info!(key, bucket = %self.bucket, "stored object in bucket");
        Ok(self.public_url(key))
    }
}
