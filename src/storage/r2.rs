use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use tracing::debug;

use crate::core::config::StorageConfig;
use crate::core::error::ObjectStoreError;

use super::{ObjectBody, ObjectList, ObjectMeta, ObjectRecord, ObjectStore};

/// Escape set for keys embedded in R2 URLs. Slashes are part of the key
/// hierarchy and must be escaped individually per segment boundary too,
/// matching how the management API addresses objects.
const KEY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// ---------------------------------------------------------------------------
// Cloudflare API envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<ListResult>,
}

#[derive(Debug, Deserialize)]
struct ListResult {
    #[serde(default)]
    objects: Vec<ApiObject>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ObjectEnvelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<ApiObject>,
}

#[derive(Debug, Deserialize)]
struct ApiObject {
    key: String,
    size: u64,
    uploaded: String,
    etag: String,
}

fn envelope_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// R2ObjectStore
// ---------------------------------------------------------------------------

/// Object-store backend for Cloudflare R2 over its REST API.
///
/// Listings and metadata go through the account management endpoint; object
/// bodies are read and written against the bucket's storage endpoint with
/// the same bearer token.
pub struct R2ObjectStore {
    http: reqwest::Client,
    account_id: String,
    bucket: String,
    api_token: String,
}

impl R2ObjectStore {
    pub fn new(config: &StorageConfig) -> Result<Self, ObjectStoreError> {
        let required = |value: &str, name: &str| -> Result<String, ObjectStoreError> {
            if value.is_empty() {
                return Err(ObjectStoreError::Config {
                    reason: format!("{} is required", name),
                });
            }
            Ok(value.to_string())
        };

        Ok(Self {
            http: reqwest::Client::new(),
            account_id: required(&config.account_id, "STORAGE_ACCOUNT_ID")?,
            bucket: required(&config.bucket, "STORAGE_BUCKET")?,
            api_token: required(&config.api_token, "STORAGE_API_TOKEN")?,
        })
    }

    fn api_base(&self) -> String {
        format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/r2/buckets/{}",
            self.account_id, self.bucket
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.r2.cloudflarestorage.com/{}/{}",
            self.account_id,
            self.bucket,
            utf8_percent_encode(key, KEY_ESCAPE)
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_token)
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<ObjectList, ObjectStoreError> {
        let mut url = format!("{}/objects?per_page={}", self.api_base(), max_keys);
        if !prefix.is_empty() {
            url.push_str(&format!(
                "&prefix={}",
                utf8_percent_encode(prefix, KEY_ESCAPE)
            ));
        }

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| ObjectStoreError::ListFailed {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::ListFailed {
                prefix: prefix.to_string(),
                reason: format!("R2 API error ({}): {}", status.as_u16(), text),
            });
        }

        let envelope: ListEnvelope =
            response
                .json()
                .await
                .map_err(|e| ObjectStoreError::ListFailed {
                    prefix: prefix.to_string(),
                    reason: e.to_string(),
                })?;

        if !envelope.success {
            return Err(ObjectStoreError::ListFailed {
                prefix: prefix.to_string(),
                reason: format!("R2 list failed: {}", envelope_errors(&envelope.errors)),
            });
        }

        let result = envelope.result.unwrap_or(ListResult {
            objects: Vec::new(),
            truncated: false,
        });

        let items: Vec<ObjectRecord> = result
            .objects
            .into_iter()
            .map(|obj| ObjectRecord {
                last_modified: parse_uploaded(&obj.uploaded),
                key: obj.key,
                size: obj.size,
                etag: obj.etag,
            })
            .collect();

        let key_count = items.len();
        Ok(ObjectList {
            items,
            is_truncated: result.truncated,
            key_count,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let url = format!(
            "{}/objects/{}",
            self.api_base(),
            utf8_percent_encode(key, KEY_ESCAPE)
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| ObjectStoreError::GetFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ObjectStoreError::NotFound {
                key: key.to_string(),
            });
        }

        let envelope: ObjectEnvelope =
            response
                .json()
                .await
                .map_err(|e| ObjectStoreError::GetFailed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;

        if !envelope.success {
            return Err(ObjectStoreError::GetFailed {
                key: key.to_string(),
                reason: format!("R2 head failed: {}", envelope_errors(&envelope.errors)),
            });
        }

        let obj = envelope.result.ok_or_else(|| ObjectStoreError::NotFound {
            key: key.to_string(),
        })?;

        // The management endpoint does not report a content type; serving
        // falls back to extension-derived resolution.
        Ok(ObjectMeta {
            content_type: "application/octet-stream".to_string(),
            content_length: obj.size,
            last_modified: parse_uploaded(&obj.uploaded),
            etag: obj.etag,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>, ObjectStoreError> {
        let response = self
            .http
            .get(self.object_url(key))
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| ObjectStoreError::GetFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 404 {
            debug!(key, "object absent");
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::GetFailed {
                key: key.to_string(),
                reason: format!("R2 get error ({}): {}", status.as_u16(), text),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| ObjectStoreError::GetFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Some(ObjectBody {
            content_length: body.len() as u64,
            body,
            content_type,
            etag,
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let response = self
            .http
            .put(self.object_url(key))
            .header("Authorization", self.bearer())
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| ObjectStoreError::PutFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::PutFailed {
                key: key.to_string(),
                reason: format!("R2 upload error ({}): {}", status.as_u16(), text),
            });
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .http
            .delete(self.object_url(key))
            .header("Authorization", self.bearer())
            .send()
            .await
            .map_err(|e| ObjectStoreError::DeleteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        // Absent keys delete cleanly; only surface real failures.
        if !status.is_success() && status.as_u16() != 404 {
            let text = response.text().await.unwrap_or_default();
            return Err(ObjectStoreError::DeleteFailed {
                key: key.to_string(),
                reason: format!("R2 delete error ({}): {}", status.as_u16(), text),
            });
        }
        Ok(())
    }

    async fn copy(&self, old_key: &str, new_key: &str) -> Result<(), ObjectStoreError> {
        // R2 has no server-side copy over this API: download, re-upload,
        // then delete the source. Same non-atomic window as the S3 rename.
        let source = self
            .get(old_key)
            .await?
            .ok_or_else(|| ObjectStoreError::CopyFailed {
                from: old_key.to_string(),
                to: new_key.to_string(),
                reason: "source object not found".to_string(),
            })?;

        self.put(new_key, source.body, &source.content_type).await?;
        self.delete(old_key).await
    }
}

fn parse_uploaded(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
