//! ragrelay Indexer
//!
//! Rebuilds the vector collection from the latest chunk export:
//! 1. Loads chunks_latest.json
//! 2. Embeds every chunk
//! 3. Deletes the old collection and creates a fresh one
//! 4. Uploads chunks in batches and verifies the final count

mod builder;

use builder::IndexBuilder;
use ragrelay_common::chunks::ChunkExport;
use ragrelay_common::embeddings::create_embedder;
use ragrelay_common::store::ChromaStore;
use ragrelay_common::{config::AppConfig, VERSION};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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

    info!("Starting ragrelay indexer v{}", VERSION);

    let export = ChunkExport::load_latest(Path::new(&config.chunking.chunks_dir))?;
    info!(
        chunks = export.total_chunks,
        exported_at = %export.timestamp,
        "Chunk export loaded"
    );

    let embedder = create_embedder(&config.embedding)?;
    info!(
        model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let store = Arc::new(ChromaStore::new(&config.store)?);

    let report = IndexBuilder::new(embedder, store)
        .build(&config.store.collection, &export.chunks)
        .await?;

    info!(
        collection = %report.collection,
        chunks = report.total_chunks,
        model = %report.embedding_model,
        duration_secs = report.duration_secs,
        "Collection rebuilt"
    );

    Ok(())
}
