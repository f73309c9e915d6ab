//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("No input documents found")]
    EmptyInput,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
