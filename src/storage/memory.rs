use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::core::error::ObjectStoreError;

use super::{ObjectBody, ObjectList, ObjectMeta, ObjectRecord, ObjectStore};

// ---------------------------------------------------------------------------
// MemoryObjectStore — test double
// ---------------------------------------------------------------------------

/// In-memory object store for unit and handler tests. Objects live in a
/// `HashMap` behind a `RwLock`; no external dependencies required.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    stored_at: DateTime<Utc>,
}

impl StoredObject {
    fn etag(&self) -> String {
        // Content-derived so overwrites with different bytes change it.
        let sum: u64 = self
            .data
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(*b as u64));
        format!("\"{:x}-{}\"", sum, self.data.len())
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<ObjectList, ObjectStoreError> {
        let objects = self.objects.read().await;
        let mut matching: Vec<(&String, &StoredObject)> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(b.0));

        let truncated = matching.len() > max_keys as usize;
        let items: Vec<ObjectRecord> = matching
            .into_iter()
            .take(max_keys as usize)
            .map(|(k, v)| ObjectRecord {
                key: k.clone(),
                size: v.data.len() as u64,
                last_modified: Some(v.stored_at),
                etag: v.etag(),
            })
            .collect();

        let key_count = items.len();
        Ok(ObjectList {
            items,
            is_truncated: truncated,
            key_count,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let objects = self.objects.read().await;
        let obj = objects.get(key).ok_or_else(|| ObjectStoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok(ObjectMeta {
            content_type: obj.content_type.clone(),
            content_length: obj.data.len() as u64,
            last_modified: Some(obj.stored_at),
            etag: obj.etag(),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<ObjectBody>, ObjectStoreError> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|obj| ObjectBody {
            body: obj.data.clone(),
            content_type: obj.content_type.clone(),
            content_length: obj.data.len() as u64,
            etag: obj.etag(),
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: content_type.to_string(),
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }

    async fn copy(&self, old_key: &str, new_key: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.write().await;
        let source = objects
            .get(old_key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::CopyFailed {
                from: old_key.to_string(),
                to: new_key.to_string(),
                reason: "source object not found".to_string(),
            })?;
        objects.insert(new_key.to_string(), source);
        objects.remove(old_key);
        Ok(())
    }
}

#[cfg(test)]
impl MemoryObjectStore {
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }
}
