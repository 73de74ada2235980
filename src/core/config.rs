use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub links: LinksConfig,
    pub delivery: DeliveryConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Object-store backend selection and credentials.
///
/// `backend` is `"s3"` or `"r2"`. The S3 fields also drive S3-compatible
/// stores via `endpoint` + `path_style`; the R2 fields are the Cloudflare
/// account/API-token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub api_token: String,
}

/// Link-table backend selection. `backend` is `"dynamodb"` or `"d1"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    pub backend: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub api_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Public CDN base URL. Drives the short-link host heuristic and the
    /// public URLs reported for uploaded objects. May be empty.
    #[serde(default)]
    pub cdn_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub admin_user: String,
    #[serde(default)]
    pub admin_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl AppConfig {
    /// Load configuration with layered overrides:
    /// 1. config/default.toml (falls back to built-in defaults if absent)
    /// 2. config/{env}.toml (based on DEPOT_ENV)
    /// 3. Environment variables (DEPOT_* prefix)
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match std::fs::read_to_string(Path::new("config/default.toml")) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse config/default.toml: {}", e))?,
            Err(_) => AppConfig::default(),
        };

        // Layer 2: environment-specific overrides
        let env_name = std::env::var("DEPOT_ENV").unwrap_or_else(|_| "development".to_string());
        let env_path = format!("config/{}.toml", env_name);
        if let Ok(env_content) = std::fs::read_to_string(&env_path) {
            config = toml::from_str(&env_content)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", env_path, e))?;
        }

        // Layer 3: environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(v) = std::env::var("DEPOT_SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = std::env::var("DEPOT_SERVER_PORT") {
            if let Ok(port) = v.parse() {
                config.server.port = port;
            }
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_BACKEND") {
            config.storage.backend = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_BUCKET") {
            config.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_REGION") {
            config.storage.region = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_ACCESS_KEY_ID") {
            config.storage.access_key_id = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_SECRET_ACCESS_KEY") {
            config.storage.secret_access_key = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_ENDPOINT") {
            config.storage.endpoint = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_ACCOUNT_ID") {
            config.storage.account_id = v;
        }
        if let Ok(v) = std::env::var("DEPOT_STORAGE_API_TOKEN") {
            config.storage.api_token = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_BACKEND") {
            config.links.backend = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_TABLE") {
            config.links.table = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_REGION") {
            config.links.region = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_ACCESS_KEY_ID") {
            config.links.access_key_id = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_SECRET_ACCESS_KEY") {
            config.links.secret_access_key = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_DATABASE_ID") {
            config.links.database_id = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_ACCOUNT_ID") {
            config.links.account_id = v;
        }
        if let Ok(v) = std::env::var("DEPOT_LINKS_API_TOKEN") {
            config.links.api_token = v;
        }
        if let Ok(v) = std::env::var("DEPOT_DELIVERY_CDN_URL") {
            config.delivery.cdn_url = v;
        }
        if let Ok(v) = std::env::var("DEPOT_AUTH_ADMIN_USER") {
            config.auth.admin_user = v;
        }
        if let Ok(v) = std::env::var("DEPOT_AUTH_ADMIN_PASSWORD") {
            config.auth.admin_password = v;
        }
        if let Ok(v) = std::env::var("DEPOT_OBSERVABILITY_LOG_LEVEL") {
            config.observability.log_level = v;
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            storage: StorageConfig {
                backend: "s3".to_string(),
                bucket: String::new(),
                region: "eu-west-2".to_string(),
                access_key_id: String::new(),
                secret_access_key: String::new(),
                endpoint: String::new(),
                path_style: false,
                account_id: String::new(),
                api_token: String::new(),
            },
            links: LinksConfig {
                backend: "dynamodb".to_string(),
                table: String::new(),
                region: "eu-west-2".to_string(),
                access_key_id: String::new(),
                secret_access_key: String::new(),
                database_id: String::new(),
                account_id: String::new(),
                api_token: String::new(),
            },
            delivery: DeliveryConfig {
                cdn_url: String::new(),
            },
            auth: AuthConfig {
                admin_user: String::new(),
                admin_password: String::new(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "text".to_string(),
                metrics_enabled: true,
            },
        }
    }
}
