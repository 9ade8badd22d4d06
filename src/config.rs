use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Semdoc server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document storage.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding backend used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the remote embedding endpoint (OpenAI-compatible).
    pub embedding_url: Option<String>,
    /// Optional API key sent to the remote embedding endpoint.
    pub embedding_api_key: Option<String>,
    /// Maximum number of texts per remote embedding request.
    pub embedding_batch_size: usize,
    /// Capacity of the single-text embedding cache.
    pub embedding_cache_capacity: usize,
    /// Word budget for each chunk produced by the chunker.
    pub chunk_size: usize,
    /// Word budget for the sentence overlap between consecutive chunks.
    pub chunk_overlap: usize,
    /// Hard cap on the number of chunks emitted per document.
    pub max_chunks_per_document: usize,
    /// Maximum accepted PDF size in megabytes.
    pub max_pdf_size_mb: usize,
    /// PDF header versions accepted by the extractor.
    pub supported_pdf_versions: Vec<String>,
    /// Language passed to the OCR engine.
    pub ocr_language: String,
    /// Per-page OCR timeout in seconds.
    pub ocr_timeout_seconds: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Result count used when a search request does not specify one.
    pub search_default_limit: usize,
    /// Upper bound applied to caller-supplied result counts.
    pub search_max_limit: usize,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    OpenAI,
    /// Deterministic built-in encoder, for offline and development use.
    Builtin,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?.parse().map_err(|()| {
                ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string())
            })?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", load_env("EMBEDDING_DIMENSION")?)?,
            embedding_url: load_env_optional("EMBEDDING_URL"),
            embedding_api_key: load_env_optional("EMBEDDING_API_KEY"),
            embedding_batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 32)?,
            embedding_cache_capacity: parse_env_or("EMBEDDING_CACHE_CAPACITY", 1000)?,
            chunk_size: parse_env_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_env_or("CHUNK_OVERLAP", 200)?,
            max_chunks_per_document: parse_env_or("MAX_CHUNKS_PER_DOCUMENT", 1000)?,
            max_pdf_size_mb: parse_env_or("MAX_PDF_SIZE_MB", 10)?,
            supported_pdf_versions: load_env_optional("SUPPORTED_PDF_VERSIONS")
                .map(|csv| {
                    csv.split(',')
                        .map(|version| version.trim().to_string())
                        .filter(|version| !version.is_empty())
                        .collect()
                })
                .unwrap_or_else(default_pdf_versions),
            ocr_language: load_env_optional("OCR_LANGUAGE").unwrap_or_else(|| "eng".to_string()),
            ocr_timeout_seconds: parse_env_or("OCR_TIMEOUT_SECONDS", 30)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            search_default_limit: parse_env_or("SEARCH_DEFAULT_LIMIT", 5)?,
            search_max_limit: parse_env_or("SEARCH_MAX_LIMIT", 50)?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => parse_env(key, value),
        None => Ok(default),
    }
}

fn default_pdf_versions() -> Vec<String> {
    ["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "builtin" => Ok(Self::Builtin),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
