//! Runtime configuration
//!
//! Built once at start-up and handed to every component behind an `Arc`.
//! Nothing here is mutated after construction.

use crate::error::{NlqError, Result};
use crate::validation::ValidationPolicy;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct NlqConfig {
    /// Connection string of the database that is introspected for the catalog.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_metabase_url")]
    pub metabase_url: String,
    pub metabase_session_token: String,
    #[serde(default = "default_metabase_database_id")]
    pub metabase_database_id: i64,

    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    #[serde(default = "default_llm_fallback_model")]
    pub llm_fallback_model: String,

    #[serde(default = "default_max_sample_rows")]
    pub max_sample_rows: usize,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_primary_max_tokens")]
    pub primary_max_tokens: u32,
    #[serde(default = "default_fallback_max_tokens")]
    pub fallback_max_tokens: u32,

    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    #[serde(default = "default_model_budget_secs")]
    pub model_budget_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// `None` keeps schema entries until `SchemaCatalog::invalidate` is called.
    #[serde(default)]
    pub schema_cache_ttl_secs: Option<u64>,

    #[serde(default)]
    pub validation_policy: ValidationPolicy,
}

fn default_metabase_url() -> String {
    "http://localhost:3000/api/dataset".to_string()
}
fn default_metabase_database_id() -> i64 {
    4
}
fn default_llm_url() -> String {
    "http://localhost:11434/api/generate".to_string()
}
fn default_llm_model() -> String {
    "codellama:7b".to_string()
}
fn default_llm_fallback_model() -> String {
    "tinyllama".to_string()
}
fn default_max_sample_rows() -> usize {
    3
}
fn default_limit() -> usize {
    100
}
fn default_temperature() -> f64 {
    0.1
}
fn default_primary_max_tokens() -> u32 {
    50
}
fn default_fallback_max_tokens() -> u32 {
    25
}
fn default_attempt_timeout_secs() -> u64 {
    30
}
fn default_model_budget_secs() -> u64 {
    60
}
fn default_http_timeout_secs() -> u64 {
    60
}

impl NlqConfig {
    /// Configuration with every optional field at its default.
    pub fn new(metabase_session_token: impl Into<String>) -> Self {
        Self {
            database_url: None,
            metabase_url: default_metabase_url(),
            metabase_session_token: metabase_session_token.into(),
            metabase_database_id: default_metabase_database_id(),
            llm_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_fallback_model: default_llm_fallback_model(),
            max_sample_rows: default_max_sample_rows(),
            default_limit: default_limit(),
            temperature: default_temperature(),
            primary_max_tokens: default_primary_max_tokens(),
            fallback_max_tokens: default_fallback_max_tokens(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            model_budget_secs: default_model_budget_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            schema_cache_ttl_secs: None,
            validation_policy: ValidationPolicy::default(),
        }
    }

    /// Load configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let token = std::env::var("METABASE_SESSION_TOKEN").map_err(|_| {
            NlqError::Config("METABASE_SESSION_TOKEN must be set".to_string())
        })?;

        let mut config = Self::new(token);
        config.database_url = std::env::var("DATABASE_URL").ok();
        config.metabase_url = env_or("METABASE_URL", config.metabase_url)?;
        config.metabase_database_id = env_or("METABASE_DATABASE_ID", config.metabase_database_id)?;
        config.llm_url = env_or("LLM_URL", config.llm_url)?;
        config.llm_model = env_or("LLM_MODEL", config.llm_model)?;
        config.llm_fallback_model = env_or("LLM_FALLBACK_MODEL", config.llm_fallback_model)?;
        config.max_sample_rows = env_or("NLQ_MAX_SAMPLE_ROWS", config.max_sample_rows)?;
        config.default_limit = env_or("NLQ_DEFAULT_LIMIT", config.default_limit)?;
        config.temperature = env_or("NLQ_LLM_TEMPERATURE", config.temperature)?;
        config.primary_max_tokens = env_or("NLQ_PRIMARY_MAX_TOKENS", config.primary_max_tokens)?;
        config.fallback_max_tokens = env_or("NLQ_FALLBACK_MAX_TOKENS", config.fallback_max_tokens)?;
        config.attempt_timeout_secs = env_or("NLQ_ATTEMPT_TIMEOUT_SECS", config.attempt_timeout_secs)?;
        config.model_budget_secs = env_or("NLQ_MODEL_BUDGET_SECS", config.model_budget_secs)?;
        config.http_timeout_secs = env_or("NLQ_HTTP_TIMEOUT_SECS", config.http_timeout_secs)?;
        config.validation_policy = env_or("NLQ_VALIDATION_POLICY", config.validation_policy)?;
        if let Ok(raw) = std::env::var("NLQ_SCHEMA_CACHE_TTL_SECS") {
            config.schema_cache_ttl_secs = Some(parse_value("NLQ_SCHEMA_CACHE_TTL_SECS", &raw)?);
        }

        Ok(config)
    }

    /// Listing endpoint of the generation service, derived from the generate URL.
    pub fn llm_tags_url(&self) -> String {
        self.llm_url.replace("/api/generate", "/api/tags")
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn model_budget(&self) -> Duration {
        Duration::from_secs(self.model_budget_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn schema_cache_ttl(&self) -> Option<Duration> {
        self.schema_cache_ttl_secs.map(Duration::from_secs)
    }

    /// Session token shortened for display.
    pub fn masked_session_token(&self) -> String {
        let prefix: String = self.metabase_session_token.chars().take(8).collect();
        format!("{}...", prefix)
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| NlqError::Config(format!("Invalid value for {}: {} ({})", key, raw, e)))
}
