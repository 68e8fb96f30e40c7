//! Query-service configuration (spec §6 "Configuration"), loaded the same
//! way as the pipeline's `extraction::PipelineConfig::from_env` —
//! `dotenvy` first, then named environment variables with explicit
//! defaults, failing loudly on a missing required key.

use extraction::{ExtractionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    pub project_id: String,
    pub environment: Environment,
    pub bind_addr: String,

    pub mongodb_uri: String,
    pub mongodb_database: String,

    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    /// `POST {embedding_endpoint_url}/embed`, see [`crate::embedding::HttpEmbedder`].
    pub embedding_endpoint_url: String,
    pub embedding_api_key: Option<String>,

    /// `key:tier` pairs, e.g. `kp_aaaa...:registered,kp_bbbb...:premium`.
    pub api_keys_spec: String,
}

impl QueryServiceConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let environment = match env_or("QUERY_SERVICE_ENVIRONMENT", "development").to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let config = QueryServiceConfig {
            project_id: require_env("EXTRACTION_PROJECT_ID")?,
            environment,
            bind_addr: format!("0.0.0.0:{}", env_or("QUERY_SERVICE_PORT", "8081")),
            mongodb_uri: require_env("MONGODB_URI")?,
            mongodb_database: env_or("MONGODB_DATABASE", "knowledge"),
            qdrant_url: require_env("QDRANT_URL")?,
            qdrant_api_key: std::env::var("QDRANT_API_KEY").ok(),
            embedding_endpoint_url: require_env("EMBEDDING_ENDPOINT_URL")?,
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            api_keys_spec: env_or("QUERY_SERVICE_API_KEYS", ""),
        };

        config.validate()?;
        Ok(config)
    }

    /// Same production/localhost guard as the pipeline config (spec §6).
    pub fn validate(&self) -> Result<()> {
        if self.environment == Environment::Production {
            for (name, uri) in [("MONGODB_URI", &self.mongodb_uri), ("QDRANT_URL", &self.qdrant_url)] {
                if is_localhost_uri(uri) {
                    return Err(ExtractionError::Config(format!(
                        "{name} points at localhost but QUERY_SERVICE_ENVIRONMENT=production"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_localhost_uri(uri: &str) -> bool {
    uri.contains("localhost") || uri.contains("127.0.0.1") || uri.contains("0.0.0.0")
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ExtractionError::Config(format!("missing required env var {key}")))
}
