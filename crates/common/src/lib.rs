//! ragrelay common library
//!
//! Shared code for the ragrelay services:
//! - Configuration management
//! - Error types and handling
//! - Chunk data model and export format
//! - Embedding client abstraction
//! - Vector store client abstraction
//! - Retrieval and context composition
//! - Metrics helpers

pub mod chunks;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod retrieval;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use retrieval::{ContextComposer, RetrievalResult, Retriever};
pub use store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model (must match between index and query time)
pub const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-large-en-v1.5";

/// Default embedding dimension for the default model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Default number of nearest-neighbor results per query
pub const DEFAULT_TOP_K: usize = 5;

/// Default character budget for composed context
pub const DEFAULT_CONTEXT_BUDGET: usize = 4000;
