pub mod d1;
pub mod dynamodb;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::LinksConfig;
use crate::core::error::LinkStoreError;
use crate::core::security::{GENERATED_CODE_LENGTH, MAX_SHORT_CODE_LENGTH, SHORT_CODE_ALPHABET};

// ---------------------------------------------------------------------------
// LinkRecord
// ---------------------------------------------------------------------------

/// One short-link binding. `created_at` is an ISO-8601 UTC timestamp set at
/// creation and never mutated; records are only ever replaced whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "shortCode")]
    pub short_code: String,
    #[serde(rename = "longUrl")]
    pub long_url: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl LinkRecord {
    pub fn new(short_code: &str, long_url: &str) -> Self {
        Self {
            short_code: short_code.to_string(),
            long_url: long_url.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkStore trait
// ---------------------------------------------------------------------------

/// Trait-based abstraction over the link table. Backends: DynamoDB, D1, and
/// an in-memory double for tests.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Insert-only bind. Fails with `AlreadyExists` when the code is taken.
    /// Read-then-write: concurrent creators of the same code can race.
    async fn put_link(&self, code: &str, url: &str) -> Result<LinkRecord, LinkStoreError>;

    /// Unconditional upsert, so retried creations stay idempotent.
    async fn put_link_overwrite(&self, code: &str, url: &str)
        -> Result<LinkRecord, LinkStoreError>;

    async fn get_link(&self, code: &str) -> Result<Option<LinkRecord>, LinkStoreError>;

    /// All records, newest first.
    async fn list_links(&self) -> Result<Vec<LinkRecord>, LinkStoreError>;

    /// Idempotent delete.
    async fn delete_link(&self, code: &str) -> Result<(), LinkStoreError>;
}

// ---------------------------------------------------------------------------
// Short-code policy
// ---------------------------------------------------------------------------

/// A client-supplied code is valid iff it is 1–64 chars drawn from
/// `[A-Za-z0-9_-]`.
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_SHORT_CODE_LENGTH
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Generate a 4-char code uniformly from the 62-char alphanumeric alphabet.
///
/// There is no collision-retry loop: creation goes through
/// `put_link_overwrite`, so a colliding code silently replaces the prior
/// record. Accepted trade-off for idempotent retried POSTs.
pub fn generate_short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..SHORT_CODE_ALPHABET.len());
            SHORT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Construct the configured link-table backend.
pub async fn from_config(config: &LinksConfig) -> Result<Arc<dyn LinkStore>, LinkStoreError> {
    match config.backend.as_str() {
        "dynamodb" => Ok(Arc::new(dynamodb::DynamoLinkStore::new(config)?)),
        "d1" => {
            let store = d1::D1LinkStore::new(config)?;
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        other => Err(LinkStoreError::Config {
            reason: format!(
                "unknown links backend '{}', expected 'dynamodb' or 'd1'",
                other
            ),
        }),
    }
}
