use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::error::LinkStoreError;

use super::{LinkRecord, LinkStore};

// ---------------------------------------------------------------------------
// MemoryLinkStore — test double
// ---------------------------------------------------------------------------

/// In-memory link table for unit and handler tests.
#[derive(Default)]
pub struct MemoryLinkStore {
    records: Arc<RwLock<HashMap<String, LinkRecord>>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn put_link(&self, code: &str, url: &str) -> Result<LinkRecord, LinkStoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(code) {
            return Err(LinkStoreError::AlreadyExists {
                code: code.to_string(),
            });
        }
        let record = LinkRecord::new(code, url);
        records.insert(code.to_string(), record.clone());
        Ok(record)
    }

    async fn put_link_overwrite(
        &self,
        code: &str,
        url: &str,
    ) -> Result<LinkRecord, LinkStoreError> {
        let record = LinkRecord::new(code, url);
        self.records
            .write()
            .await
            .insert(code.to_string(), record.clone());
        Ok(record)
    }

    async fn get_link(&self, code: &str) -> Result<Option<LinkRecord>, LinkStoreError> {
        Ok(self.records.read().await.get(code).cloned())
    }

    async fn list_links(&self) -> Result<Vec<LinkRecord>, LinkStoreError> {
        let mut records: Vec<LinkRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_link(&self, code: &str) -> Result<(), LinkStoreError> {
        self.records.write().await.remove(code);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_link_rejects_bound_code() {
        let store = MemoryLinkStore::new();
        store.put_link("abcd", "https://example.com/1").await.unwrap();
        let err = store
            .put_link("abcd", "https://example.com/2")
            .await
            .unwrap_err();
        assert!(matches!(err, LinkStoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_overwrite_is_idempotent() {
        let store = MemoryLinkStore::new();
        store
            .put_link_overwrite("abcd", "https://example.com/x")
            .await
            .unwrap();
        store
            .put_link_overwrite("abcd", "https://example.com/x")
            .await
            .unwrap();

        let links = store.list_links().await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].long_url, "https://example.com/x");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_target() {
        let store = MemoryLinkStore::new();
        store
            .put_link_overwrite("abcd", "https://example.com/old")
            .await
            .unwrap();
        store
            .put_link_overwrite("abcd", "https://example.com/new")
            .await
            .unwrap();

        let record = store.get_link("abcd").await.unwrap().unwrap();
        assert_eq!(record.long_url, "https://example.com/new");
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = MemoryLinkStore::new();
        assert!(store.get_link("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryLinkStore::new();
        // Inject fixed timestamps so the ordering is deterministic.
        {
            let mut records = store.records.write().await;
            for (code, ts) in [
                ("old1", "2024-01-01T00:00:00.000Z"),
                ("new1", "2025-06-01T00:00:00.000Z"),
                ("mid1", "2024-08-15T12:00:00.000Z"),
            ] {
                records.insert(
                    code.to_string(),
                    LinkRecord {
                        short_code: code.to_string(),
                        long_url: "https://example.com".to_string(),
                        created_at: ts.to_string(),
                    },
                );
            }
        }

        let links = store.list_links().await.unwrap();
        let codes: Vec<&str> = links.iter().map(|l| l.short_code.as_str()).collect();
        assert_eq!(codes, vec!["new1", "mid1", "old1"]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryLinkStore::new();
        store.put_link("abcd", "https://example.com").await.unwrap();
        store.delete_link("abcd").await.unwrap();
        store.delete_link("abcd").await.unwrap();
        assert!(store.get_link("abcd").await.unwrap().is_none());
    }
}
