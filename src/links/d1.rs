use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::LinksConfig;
use crate::core::error::LinkStoreError;

use super::{LinkRecord, LinkStore};

// ---------------------------------------------------------------------------
// D1 API envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    #[serde(default)]
    result: Option<Vec<QueryResult>>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    results: Vec<Value>,
}

// ---------------------------------------------------------------------------
// D1LinkStore
// ---------------------------------------------------------------------------

/// Link-table backend on Cloudflare D1, speaking SQL over the REST query
/// endpoint.
pub struct D1LinkStore {
    http: reqwest::Client,
    account_id: String,
    database_id: String,
    api_token: String,
}

impl D1LinkStore {
    pub fn new(config: &LinksConfig) -> Result<Self, LinkStoreError> {
        let required = |value: &str, name: &str| -> Result<String, LinkStoreError> {
            if value.is_empty() {
                return Err(LinkStoreError::Config {
                    reason: format!("{} is required", name),
                });
            }
            Ok(value.to_string())
        };

        Ok(Self {
            http: reqwest::Client::new(),
            account_id: required(&config.account_id, "LINKS_ACCOUNT_ID")?,
            database_id: required(&config.database_id, "LINKS_DATABASE_ID")?,
            api_token: required(&config.api_token, "LINKS_API_TOKEN")?,
        })
    }

    /// Create the links table and its createdAt index if they are missing.
    /// Called once at startup.
    pub async fn ensure_schema(&self) -> Result<(), LinkStoreError> {
        self.execute(
            "CREATE TABLE IF NOT EXISTS links (\
             shortCode TEXT PRIMARY KEY, \
             longUrl TEXT NOT NULL, \
             createdAt TEXT NOT NULL)",
            vec![],
        )
        .await?;
        self.execute(
            "CREATE INDEX IF NOT EXISTS idx_links_createdAt ON links(createdAt)",
            vec![],
        )
        .await?;
        Ok(())
    }

    async fn execute(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Value>, LinkStoreError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/d1/database/{}/query",
            self.account_id, self.database_id
        );

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&json!({ "sql": sql, "params": params }))
            .send()
            .await
            .map_err(|e| LinkStoreError::QueryFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LinkStoreError::QueryFailed {
                reason: format!("D1 API error ({}): {}", status.as_u16(), text),
            });
        }

        let envelope: QueryEnvelope =
            response
                .json()
                .await
                .map_err(|e| LinkStoreError::QueryFailed {
                    reason: e.to_string(),
                })?;

        if !envelope.success {
            let messages = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LinkStoreError::QueryFailed {
                reason: format!("D1 query failed: {}", messages),
            });
        }

        Ok(envelope
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|r| r.results)
            .unwrap_or_default())
    }
}

fn row_to_record(row: &Value) -> LinkRecord {
    let field = |name: &str| {
        row.get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    LinkRecord {
        short_code: field("shortCode"),
        long_url: field("longUrl"),
        created_at: field("createdAt"),
    }
}

#[async_trait]
impl LinkStore for D1LinkStore {
    async fn put_link(&self, code: &str, url: &str) -> Result<LinkRecord, LinkStoreError> {
        if self.get_link(code).await?.is_some() {
            return Err(LinkStoreError::AlreadyExists {
                code: code.to_string(),
            });
        }
        let record = LinkRecord::new(code, url);
        self.execute(
            "INSERT INTO links (shortCode, longUrl, createdAt) VALUES (?, ?, ?)",
            vec![
                json!(record.short_code),
                json!(record.long_url),
                json!(record.created_at),
            ],
        )
        .await?;
        Ok(record)
    }

    async fn put_link_overwrite(
        &self,
        code: &str,
        url: &str,
    ) -> Result<LinkRecord, LinkStoreError> {
        let record = LinkRecord::new(code, url);
        self.execute(
            "INSERT OR REPLACE INTO links (shortCode, longUrl, createdAt) VALUES (?, ?, ?)",
            vec![
                json!(record.short_code),
                json!(record.long_url),
                json!(record.created_at),
            ],
        )
        .await?;
        Ok(record)
    }

    async fn get_link(&self, code: &str) -> Result<Option<LinkRecord>, LinkStoreError> {
        let rows = self
            .execute(
                "SELECT shortCode, longUrl, createdAt FROM links WHERE shortCode = ?",
                vec![json!(code)],
            )
            .await?;
        Ok(rows.first().map(row_to_record))
    }

    async fn list_links(&self) -> Result<Vec<LinkRecord>, LinkStoreError> {
        let rows = self
            .execute(
                "SELECT shortCode, longUrl, createdAt FROM links ORDER BY createdAt DESC",
                vec![],
            )
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn delete_link(&self, code: &str) -> Result<(), LinkStoreError> {
        self.execute("DELETE FROM links WHERE shortCode = ?", vec![json!(code)])
            .await?;
        Ok(())
    }
}
