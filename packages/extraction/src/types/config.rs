//! Pipeline configuration, loaded from the process environment (spec §2
//! ambient config).
//!
//! Mirrors the teacher's `config::Config::from_env` style: every field is a
//! named environment variable, defaults are applied where the spec allows
//! one, and a dedicated validation pass rejects configurations that would be
//! dangerous in production (e.g. a `localhost` Mongo/Qdrant URI).

use std::collections::HashMap;
use std::env;

use crate::error::{ExtractionError, Result};

/// Deployment environment. Gates the localhost-URI check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn from_env_var(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Requests-per-hour quota for one auth tier (spec §4.13).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitTier {
    pub requests_per_hour: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub project_id: String,
    pub environment: Environment,

    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub connection_timeout_ms: u64,
    pub max_pool_size: u32,

    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,

    pub prompt_dir: String,

    pub rate_limit_tiers: HashMap<String, RateLimitTier>,
}

impl PipelineConfig {
    /// Loads configuration from environment variables, applying `.env` via
    /// `dotenvy` if present. Fails loudly rather than silently defaulting
    /// credentials.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let environment = Environment::from_env_var(&env_or(
            "EXTRACTION_ENVIRONMENT",
            "development",
        ));

        let config = PipelineConfig {
            project_id: require_env("EXTRACTION_PROJECT_ID")?,
            environment,
            mongodb_uri: require_env("MONGODB_URI")?,
            mongodb_database: env_or("MONGODB_DATABASE", "knowledge"),
            connection_timeout_ms: env_or("MONGODB_CONNECTION_TIMEOUT_MS", "5000")
                .parse()
                .map_err(|_| {
                    ExtractionError::Config("MONGODB_CONNECTION_TIMEOUT_MS must be a number".into())
                })?,
            max_pool_size: env_or("MONGODB_MAX_POOL_SIZE", "10")
                .parse()
                .map_err(|_| ExtractionError::Config("MONGODB_MAX_POOL_SIZE must be a number".into()))?,
            qdrant_url: require_env("QDRANT_URL")?,
            qdrant_api_key: env::var("QDRANT_API_KEY").ok(),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: env_or("LLM_MODEL", "claude-3-5-sonnet-20241022"),
            llm_max_tokens: env_or("LLM_MAX_TOKENS", "4096")
                .parse()
                .map_err(|_| ExtractionError::Config("LLM_MAX_TOKENS must be a number".into()))?,
            prompt_dir: env_or("PROMPT_DIR", crate::prompts::default_prompt_dir()),
            rate_limit_tiers: default_rate_limit_tiers(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would be dangerous to run in production:
    /// a `localhost`/`127.0.0.1` storage URI with `EXTRACTION_ENVIRONMENT=production`.
    pub fn validate(&self) -> Result<()> {
        if self.environment == Environment::Production {
            for (name, uri) in [("MONGODB_URI", &self.mongodb_uri), ("QDRANT_URL", &self.qdrant_url)] {
                if is_localhost_uri(uri) {
                    return Err(ExtractionError::Config(format!(
                        "{name} points at localhost but EXTRACTION_ENVIRONMENT=production"
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
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| ExtractionError::Config(format!("missing required env var {key}")))
}

fn default_rate_limit_tiers() -> HashMap<String, RateLimitTier> {
    let mut tiers = HashMap::new();
    tiers.insert("public".to_string(), RateLimitTier { requests_per_hour: 60 });
    tiers.insert("registered".to_string(), RateLimitTier { requests_per_hour: 600 });
    tiers.insert("premium".to_string(), RateLimitTier { requests_per_hour: 6000 });
    tiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_rejects_localhost_mongo() {
        let config = PipelineConfig {
            project_id: "p".into(),
            environment: Environment::Production,
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_database: "knowledge".into(),
            connection_timeout_ms: 5000,
            max_pool_size: 10,
            qdrant_url: "https://qdrant.example.com".into(),
            qdrant_api_key: None,
            anthropic_api_key: "key".into(),
            llm_model: "m".into(),
            llm_max_tokens: 4096,
            prompt_dir: "/tmp/prompts".into(),
            rate_limit_tiers: default_rate_limit_tiers(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn development_allows_localhost() {
        let config = PipelineConfig {
            project_id: "p".into(),
            environment: Environment::Development,
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_database: "knowledge".into(),
            connection_timeout_ms: 5000,
            max_pool_size: 10,
            qdrant_url: "http://localhost:6334".into(),
            qdrant_api_key: None,
            anthropic_api_key: "key".into(),
            llm_model: "m".into(),
            llm_max_tokens: 4096,
            prompt_dir: "/tmp/prompts".into(),
            rate_limit_tiers: default_rate_limit_tiers(),
        };
        assert!(config.validate().is_ok());
    }
}
