//! Configuration management for the travel assistant.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for chat completions and embeddings.
//! - `LLM_BASE_URL` - Optional. OpenAI-compatible endpoint. Defaults to `https://api.openai.com/v1`.
//! - `DEFAULT_MODEL` - Optional. Chat model. Defaults to `gpt-4o-mini`.
//! - `EMBED_MODEL` - Optional. Embedding model. Defaults to `text-embedding-3-small`.
//! - `EMBED_BASE_URL` - Optional. Embedding endpoint. Defaults to `LLM_BASE_URL`.
//! - `INDEX_DIR` - Optional. Vector index directory. Defaults to `./vector_store`.
//! - `DOCS_PATH` - Optional. Source documents directory. Defaults to `./data`.
//! - `DOCS_EXTENSIONS` - Optional. Comma-separated file extensions to ingest. Defaults to `pdf`.
//! - `RETRIEVAL_TOP_K` - Optional. Chunks returned per document search. Defaults to `5`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `10`.
//! - `SESSION_TTL_HOURS` - Optional. Idle time before a session expires. Defaults to `24`.
//! - `SESSION_SWEEP_SECS` - Optional. Interval between expiry sweeps. Defaults to `3600`.
//! - `MAX_SESSIONS` - Optional. Session capacity before LRU eviction. Defaults to `10000`.
//! - `REQUEST_TIMEOUT_SECS` - Optional. Timeout for provider HTTP calls. Defaults to `60`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Required path does not exist: {0}")]
    MissingPath(PathBuf),
}

/// Document index configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Directory holding the persisted vector index
    pub index_dir: PathBuf,

    /// Directory scanned (recursively) for source documents
    pub docs_path: PathBuf,

    /// Lower-case file extensions accepted by the loader
    pub extensions: Vec<String>,

    /// Embedding model identifier
    pub embed_model: String,

    /// Embedding endpoint base URL
    pub embed_base_url: String,

    /// Number of chunks returned by a document search
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./vector_store"),
            docs_path: PathBuf::from("./data"),
            extensions: vec!["pdf".to_string()],
            embed_model: "text-embedding-3-small".to_string(),
            embed_base_url: DEFAULT_BASE_URL.to_string(),
            top_k: 5,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session is swept
    pub ttl: Duration,

    /// How often the sweeper runs
    pub sweep_interval: Duration,

    /// Maximum live sessions; the least recently active one is evicted beyond this
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
            max_sessions: 10_000,
        }
    }
}

/// Assistant configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the OpenAI-compatible provider
    pub api_key: String,

    /// Chat completion endpoint base URL
    pub llm_base_url: String,

    /// Default chat model identifier
    pub default_model: String,

    /// Maximum model calls per user turn
    pub max_iterations: usize,

    /// Timeout applied to every provider HTTP call
    pub request_timeout: Duration,

    /// Document index configuration
    pub index: IndexConfig,

    /// Session configuration
    pub sessions: SessionConfig,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for unparseable numeric settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let llm_base_url =
            std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let max_iterations = parse_env("MAX_ITERATIONS", 10usize)?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let request_timeout = Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 60u64)?);

        let extensions = std::env::var("DOCS_EXTENSIONS")
            .map(|v| parse_extensions(&v))
            .unwrap_or_else(|_| vec!["pdf".to_string()]);
        if extensions.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DOCS_EXTENSIONS".to_string(),
                "no extensions given".to_string(),
            ));
        }

        let index = IndexConfig {
            index_dir: std::env::var("INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./vector_store")),
            docs_path: std::env::var("DOCS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            extensions,
            embed_model: std::env::var("EMBED_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embed_base_url: std::env::var("EMBED_BASE_URL")
                .unwrap_or_else(|_| llm_base_url.clone()),
            top_k: parse_env("RETRIEVAL_TOP_K", 5usize)?,
        };

        let sessions = SessionConfig {
            ttl: Duration::from_secs(parse_env("SESSION_TTL_HOURS", 24u64)? * 3600),
            sweep_interval: Duration::from_secs(parse_env("SESSION_SWEEP_SECS", 3600u64)?),
            max_sessions: parse_env("MAX_SESSIONS", 10_000usize)?,
        };

        Ok(Self {
            api_key,
            llm_base_url,
            default_model,
            max_iterations,
            request_timeout,
            index,
            sessions,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            llm_base_url: DEFAULT_BASE_URL.to_string(),
            default_model: "gpt-4o-mini".to_string(),
            max_iterations: 10,
            request_timeout: Duration::from_secs(60),
            index: IndexConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
