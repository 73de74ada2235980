use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::DateTime;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;

use crate::core::config::StorageConfig;
use crate::core::error::ObjectStoreError;

use super::{ObjectBody, ObjectList, ObjectMeta, ObjectRecord, ObjectStore};

/// Characters escaped in the `x-amz-copy-source` header. Slashes separate
/// bucket and key and must survive.
const COPY_SOURCE_ESCAPE: &AsciiSet = &CONTROLS
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
// S3ObjectStore
// ---------------------------------------------------------------------------

/// Object-store backend wrapping `aws-sdk-s3`.
///
/// Supports both AWS S3 and S3-compatible stores (MinIO, DigitalOcean
/// Spaces, etc.) via configurable endpoint and path-style addressing.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn new(config: &StorageConfig) -> Result<Self, ObjectStoreError> {
        let required = |value: &str, name: &str| -> Result<String, ObjectStoreError> {
            if value.is_empty() {
                return Err(ObjectStoreError::Config {
                    reason: format!("{} is required", name),
                });
            }
            Ok(value.to_string())
        };

        let bucket = required(&config.bucket, "STORAGE_BUCKET")?;
        let access_key_id = required(&config.access_key_id, "STORAGE_ACCESS_KEY_ID")?;
        let secret_access_key = required(&config.secret_access_key, "STORAGE_SECRET_ACCESS_KEY")?;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "depot-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.path_style);

        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self { client, bucket })
    }

    fn copy_source(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(key, COPY_SOURCE_ESCAPE)
        )
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<ObjectList, ObjectStoreError> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(max_keys);

        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }

        let output = req
            .send()
            .await
            .map_err(|e| ObjectStoreError::ListFailed {
                prefix: prefix.to_string(),
                reason: e.to_string(),
            })?;

        let items: Vec<ObjectRecord> = output
            .contents
            .unwrap_or_default()
            .into_iter()
            .map(|obj| ObjectRecord {
                key: obj.key.unwrap_or_default(),
                size: obj.size.unwrap_or(0).max(0) as u64,
                last_modified: obj
                    .last_modified
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                etag: obj.e_tag.unwrap_or_default(),
            })
            .collect();

        let key_count = items.len();
        Ok(ObjectList {
            items,
            is_truncated: output.is_truncated.unwrap_or(false),
            key_count,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(ObjectMeta {
                content_type: output
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                content_length: output.content_length.unwrap_or(0).max(0) as u64,
                last_modified: output
                    .last_modified
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                etag: output.e_tag.unwrap_or_default(),
            }),
            Err(e) => {
                let err_str = e.to_string();
                if is_not_found(&err_str, &e) {
                    return Err(ObjectStoreError::NotFound {
                        key: key.to_string(),
                    });
                }
                Err(ObjectStoreError::GetFailed {
                    key: key.to_string(),
                    reason: err_str,
                })
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>, ObjectStoreError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let content_type = output
                    .content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let etag = output.e_tag.unwrap_or_default();
                let content_length = output.content_length.unwrap_or(0).max(0) as u64;

                let body = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| ObjectStoreError::GetFailed {
                        key: key.to_string(),
                        reason: e.to_string(),
                    })?
                    .into_bytes();

                let content_length = if content_length > 0 {
                    content_length
                } else {
                    body.len() as u64
                };

                Ok(Some(ObjectBody {
                    body,
                    content_type,
                    content_length,
                    etag,
                }))
            }
            Err(e) => {
                let err_str = e.to_string();
                if is_not_found(&err_str, &e) {
                    debug!(key, "object absent");
                    return Ok(None);
                }
                Err(ObjectStoreError::GetFailed {
                    key: key.to_string(),
                    reason: err_str,
                })
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ObjectStoreError::PutFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::DeleteFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn copy(&self, old_key: &str, new_key: &str) -> Result<(), ObjectStoreError> {
        // Store-side copy then delete of the source. A crash in between
        // leaves both keys present; callers accept the at-least-once mode.
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(old_key))
            .key(new_key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::CopyFailed {
                from: old_key.to_string(),
                to: new_key.to_string(),
                reason: e.to_string(),
            })?;

        self.delete(old_key).await
    }
}

/// Classify an SDK error string as a simple-absence miss.
fn is_not_found<E: std::fmt::Debug>(err_str: &str, err: &E) -> bool {
    if err_str.contains("NoSuchKey") || err_str.contains("NotFound") || err_str.contains("404") {
        return true;
    }
    // Service errors often only carry the code in their Debug form.
    let debug = format!("{:?}", err);
    debug.contains("NoSuchKey") || debug.contains("NotFound")
}
