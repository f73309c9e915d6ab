//! ragrelay Ingestion
//!
//! Builds the chunk corpus from raw documents:
//! 1. Loads .txt and .md files from the data directory
//! 2. Splits them into overlapping chunks
//! 3. Writes a timestamped chunk export plus a stable "latest" copy

mod chunker;
mod errors;
mod loader;

use ragrelay_common::chunks::ChunkExport;
use ragrelay_common::{config::AppConfig, metrics, VERSION};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting ragrelay ingestion v{}", VERSION);

    let documents = loader::load_documents(Path::new(&config.chunking.data_dir))?;
    if documents.is_empty() {
        anyhow::bail!(
            "no .txt or .md documents found in {}",
            config.chunking.data_dir
        );
    }

    let chunks = chunker::chunk_documents(&documents, &config.chunking)?;
    metrics::record_chunks_created(chunks.len());

    let total_chars: usize = chunks.iter().map(|c| c.length).sum();
    let min_chars = chunks.iter().map(|c| c.length).min().unwrap_or(0);
    let max_chars = chunks.iter().map(|c| c.length).max().unwrap_or(0);
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        min_chunk_chars = min_chars,
        avg_chunk_chars = total_chars / chunks.len().max(1),
        max_chunk_chars = max_chars,
        "Corpus chunked"
    );

    let export = ChunkExport::new(chunks);
    let path = export.write_snapshot(Path::new(&config.chunking.chunks_dir))?;
    info!(path = %path.display(), total_chunks = export.total_chunks, "Chunk export written");

    Ok(())
}
