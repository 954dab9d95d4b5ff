//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use docchat_core::{ChunkConfig, PromptConfig};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for an OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub llm: EndpointConfig,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_timeout: Duration,
    pub embedding: EndpointConfig,
    pub embedding_batch_size: usize,
    pub chunking: ChunkConfig,
    pub retrieval_top_k: usize,
    pub retrieval_min_similarity: Option<f32>,
    pub prompt: PromptConfig,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:5000"))?;
        let database_url = var("DATABASE_URL", "sqlite://docchat.db?mode=rwc");

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = var("CORS_ORIGIN", "http://localhost:3000");

        // --- Load Generation Settings ---
        let llm_api_key = lookup("LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        let llm = EndpointConfig {
            api_base: var("LLM_API_BASE", "https://api.groq.com/openai/v1"),
            api_key: llm_api_key.clone(),
            model: var("CHAT_MODEL", "llama3-70b-8192"),
        };
        let llm_temperature = parse_var("LLM_TEMPERATURE", &var("LLM_TEMPERATURE", "0.3"))?;
        let llm_max_tokens = parse_var("LLM_MAX_TOKENS", &var("LLM_MAX_TOKENS", "1000"))?;
        let llm_timeout_secs: u64 =
            parse_var("LLM_TIMEOUT_SECS", &var("LLM_TIMEOUT_SECS", "60"))?;
        if llm_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "LLM_TIMEOUT_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Load Embedding Settings ---
        let embedding = EndpointConfig {
            api_base: var("EMBEDDING_API_BASE", "https://api.openai.com/v1"),
            api_key: lookup("EMBEDDING_API_KEY").or(llm_api_key),
            model: var("EMBEDDING_MODEL", "text-embedding-3-small"),
        };
        let embedding_batch_size: usize =
            parse_var("EMBEDDING_BATCH_SIZE", &var("EMBEDDING_BATCH_SIZE", "64"))?;
        if embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_BATCH_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        // --- Load Retrieval Pipeline Settings ---
        let chunk_size = parse_var("CHUNK_SIZE", &var("CHUNK_SIZE", "1000"))?;
        let overlap = parse_var("CHUNK_OVERLAP", &var("CHUNK_OVERLAP", "200"))?;
        let chunking = ChunkConfig::new(chunk_size, overlap)
            .map_err(|e| ConfigError::InvalidValue("CHUNK_OVERLAP".to_string(), e.to_string()))?;

        let retrieval_top_k = parse_var("RETRIEVAL_TOP_K", &var("RETRIEVAL_TOP_K", "5"))?;
        let retrieval_min_similarity = lookup("RETRIEVAL_MIN_SIMILARITY")
            .map(|v| parse_var("RETRIEVAL_MIN_SIMILARITY", &v))
            .transpose()?;

        let prompt = PromptConfig {
            history_turns: parse_var("HISTORY_TURNS", &var("HISTORY_TURNS", "5"))?,
            max_prompt_chars: parse_var("MAX_PROMPT_CHARS", &var("MAX_PROMPT_CHARS", "24000"))?,
        };
        let max_upload_bytes =
            parse_var("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "10485760"))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            llm,
            llm_temperature,
            llm_max_tokens,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            embedding,
            embedding_batch_size,
            chunking,
            retrieval_top_k,
            retrieval_min_similarity,
            prompt,
            max_upload_bytes,
        })
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 5000);
        assert_eq!(config.chunking, ChunkConfig::new(1000, 200).unwrap());
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.retrieval_min_similarity, None);
        assert_eq!(config.prompt, PromptConfig::default());
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn embedding_key_falls_back_to_llm_key() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));

        let config = load(&[("LLM_API_KEY", "gsk"), ("EMBEDDING_API_KEY", "emb")]).unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk"));
        assert_eq!(config.embedding.api_key.as_deref(), Some("emb"));
    }

    #[test]
    fn overlap_not_smaller_than_chunk_size_is_rejected() {
        let err = load(&[("CHUNK_SIZE", "200"), ("CHUNK_OVERLAP", "200")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "CHUNK_OVERLAP"));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = load(&[("RETRIEVAL_TOP_K", "many")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "RETRIEVAL_TOP_K"));

        let err = load(&[("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));

        let err = load(&[("LLM_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "LLM_TIMEOUT_SECS"));
    }

    #[test]
    fn min_similarity_is_optional() {
        let config = load(&[("RETRIEVAL_MIN_SIMILARITY", "0.1")]).unwrap();
        assert_eq!(config.retrieval_min_similarity, Some(0.1));
    }
}
