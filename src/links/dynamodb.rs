use async_trait::async_trait;
use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use crate::core::config::LinksConfig;
use crate::core::error::LinkStoreError;

use super::{LinkRecord, LinkStore};

// ---------------------------------------------------------------------------
// DynamoLinkStore
// ---------------------------------------------------------------------------

/// Link-table backend on DynamoDB: a table keyed by `shortCode` with
/// `longUrl` and `createdAt` string attributes.
pub struct DynamoLinkStore {
    client: Client,
    table: String,
}

impl DynamoLinkStore {
    pub fn new(config: &LinksConfig) -> Result<Self, LinkStoreError> {
        let required = |value: &str, name: &str| -> Result<String, LinkStoreError> {
            if value.is_empty() {
                return Err(LinkStoreError::Config {
                    reason: format!("{} is required", name),
                });
            }
            Ok(value.to_string())
        };

        let table = required(&config.table, "LINKS_TABLE")?;
        let access_key_id = required(&config.access_key_id, "LINKS_ACCESS_KEY_ID")?;
        let secret_access_key = required(&config.secret_access_key, "LINKS_SECRET_ACCESS_KEY")?;

        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "depot-config",
        );

        let dynamo_config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .build();

        Ok(Self {
            client: Client::from_conf(dynamo_config),
            table,
        })
    }

    async fn write_record(&self, record: &LinkRecord) -> Result<(), LinkStoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .item("shortCode", AttributeValue::S(record.short_code.clone()))
            .item("longUrl", AttributeValue::S(record.long_url.clone()))
            .item("createdAt", AttributeValue::S(record.created_at.clone()))
            .send()
            .await
            .map_err(|e| LinkStoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

fn string_attr(
    item: &std::collections::HashMap<String, AttributeValue>,
    name: &str,
) -> String {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl LinkStore for DynamoLinkStore {
    async fn put_link(&self, code: &str, url: &str) -> Result<LinkRecord, LinkStoreError> {
        // Read-then-write; a concurrent creator with the same code can slip
        // through the gap. Documented, not transactionally resolved.
        if self.get_link(code).await?.is_some() {
            return Err(LinkStoreError::AlreadyExists {
                code: code.to_string(),
            });
        }
        let record = LinkRecord::new(code, url);
        self.write_record(&record).await?;
        Ok(record)
    }

    async fn put_link_overwrite(
        &self,
        code: &str,
        url: &str,
    ) -> Result<LinkRecord, LinkStoreError> {
        let record = LinkRecord::new(code, url);
        self.write_record(&record).await?;
        Ok(record)
    }

    async fn get_link(&self, code: &str) -> Result<Option<LinkRecord>, LinkStoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("shortCode", AttributeValue::S(code.to_string()))
            .send()
            .await
            .map_err(|e| LinkStoreError::QueryFailed {
                reason: e.to_string(),
            })?;

        Ok(output.item.map(|item| LinkRecord {
            short_code: string_attr(&item, "shortCode"),
            long_url: string_attr(&item, "longUrl"),
            created_at: string_attr(&item, "createdAt"),
        }))
    }

    async fn list_links(&self) -> Result<Vec<LinkRecord>, LinkStoreError> {
        let output = self
            .client
            .scan()
            .table_name(&self.table)
            .send()
            .await
            .map_err(|e| LinkStoreError::QueryFailed {
                reason: e.to_string(),
            })?;

        let mut records: Vec<LinkRecord> = output
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| LinkRecord {
                short_code: string_attr(&item, "shortCode"),
                long_url: string_attr(&item, "longUrl"),
                created_at: string_attr(&item, "createdAt"),
            })
            .collect();

        // RFC 3339 UTC timestamps sort lexicographically; newest first.
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_link(&self, code: &str) -> Result<(), LinkStoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("shortCode", AttributeValue::S(code.to_string()))
            .send()
            .await
            .map_err(|e| LinkStoreError::QueryFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
