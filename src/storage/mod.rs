pub mod memory;
pub mod r2;
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::StorageConfig;
use crate::core::error::ObjectStoreError;

// ---------------------------------------------------------------------------
// ObjectStore trait
// ---------------------------------------------------------------------------

/// Trait-based abstraction over the object-store backend.
///
/// Route handlers depend only on this trait; the concrete backend
/// (`S3ObjectStore` or `R2ObjectStore`) is chosen once at startup from
/// configuration. `MemoryObjectStore` stands in for unit tests. Every call
/// goes straight to the backend: there is no caching or buffering layer in
/// front of it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects under a prefix. `max_keys` is already clamped by the
    /// caller. Ordering is backend-native, not guaranteed sorted.
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<ObjectList, ObjectStoreError>;

    /// Metadata for one key, `NotFound` if absent.
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError>;

    /// Fetch an object. `Ok(None)` on simple absence, never an error.
    async fn get(&self, key: &str) -> Result<Option<ObjectBody>, ObjectStoreError>;

    /// Full overwrite of a key. Idempotent by key.
    async fn put(&self, key: &str, body: Bytes, content_type: &str)
        -> Result<(), ObjectStoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Rename: store-side copy followed by delete of the source. Not
    /// atomic — a crash in between leaves both keys present.
    async fn copy(&self, old_key: &str, new_key: &str) -> Result<(), ObjectStoreError>;
}

// ---------------------------------------------------------------------------
// Storage types
// ---------------------------------------------------------------------------

/// One listed object: a transient projection of store metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub key: String,
    pub size: u64,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: String,
}

/// Result of a LIST call.
#[derive(Debug, Clone)]
pub struct ObjectList {
    pub items: Vec<ObjectRecord>,
    pub is_truncated: bool,
    pub key_count: usize,
}

/// Metadata returned by HEAD.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub content_type: String,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: String,
}

/// Body and metadata returned by GET.
#[derive(Debug, Clone)]
pub struct ObjectBody {
    pub body: Bytes,
    pub content_type: String,
    pub content_length: u64,
    pub etag: String,
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Construct the configured object-store backend.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, ObjectStoreError> {
    match config.backend.as_str() {
        "s3" => Ok(Arc::new(s3::S3ObjectStore::new(config).await?)),
        "r2" => Ok(Arc::new(r2::R2ObjectStore::new(config)?)),
        other => Err(ObjectStoreError::Config {
            reason: format!("unknown storage backend '{}', expected 's3' or 'r2'", other),
        }),
    }
}

/// Public URL for a stored object, derived from the configured CDN base URL
/// or the canonical bucket endpoint.
pub fn public_url(config: &StorageConfig, cdn_url: &str, key: &str) -> String {
    if !cdn_url.is_empty() {
        let base = if cdn_url.starts_with("http") {
            cdn_url.to_string()
        } else {
            format!("https://{}", cdn_url)
        };
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }
    format!(
        "https://{}.s3.{}.amazonaws.com/{}",
        config.bucket, config.region, key
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;

    #[test]
    fn test_public_url_prefers_cdn() {
        let config = AppConfig::default().storage;
        assert_eq!(
            public_url(&config, "https://cdn.example.com", "a/b.png"),
            "https://cdn.example.com/a/b.png"
        );
        // Scheme-less CDN hosts get https prepended, trailing slash trimmed.
        assert_eq!(
            public_url(&config, "cdn.example.com/", "a/b.png"),
            "https://cdn.example.com/a/b.png"
        );
    }

    #[test]
    fn test_public_url_falls_back_to_bucket_endpoint() {
        let mut config = AppConfig::default().storage;
        config.bucket = "media".to_string();
        config.region = "eu-west-2".to_string();
        assert_eq!(
            public_url(&config, "", "a/b.png"),
            "https://media.s3.eu-west-2.amazonaws.com/a/b.png"
        );
    }
}
