//! Configuration management for ragrelay services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Proxy server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Vector store (Chroma) configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Ingestion / chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Chroma server base URL
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Target collection name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible embeddings API base URL
    #[serde(default = "default_embedding_base")]
    pub api_base: String,

    /// API key (optional for local embedding servers)
    pub api_key: Option<String>,

    /// Model to use; must match between index time and query time
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding requests (performance knob only)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// OpenAI-compatible generation backend base URL (e.g. vLLM)
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// API key forwarded to the backend
    #[serde(default = "default_backend_key")]
    pub api_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Default number of chunks to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Character budget for composed context
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Directory containing source documents (.txt / .md)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Directory for chunk export files
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: String,

    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters (< chunk_size)
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8001 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_store_url() -> String { "http://localhost:8008".to_string() }
fn default_collection() -> String { "documents".to_string() }
fn default_store_timeout() -> u64 { 30 }
fn default_embedding_base() -> String { "http://localhost:8081/v1".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_batch_size() -> usize { 32 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_backend_url() -> String { "http://localhost:8000/v1".to_string() }
fn default_backend_key() -> String { "EMPTY".to_string() }
fn default_backend_timeout() -> u64 { 120 }
fn default_top_k() -> usize { crate::DEFAULT_TOP_K }
fn default_max_context_chars() -> usize { crate::DEFAULT_CONTEXT_BUDGET }
fn default_data_dir() -> String { "data".to_string() }
fn default_chunks_dir() -> String { "chunks".to_string() }
fn default_chunk_size() -> usize { 1000 }
fn default_chunk_overlap() -> usize { 200 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8002
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(ConfigError::Message(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Message(
                "retrieval.top_k must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            collection: default_collection(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_embedding_base(),
            api_key: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_key: default_backend_key(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            chunks_dir: default_chunks_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            backend: BackendConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.embedding.model, crate::DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.max_context_chars, 4000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let mut config = AppConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_top_k_must_be_positive() {
        let mut config = AppConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}
