//! Index building
//!
//! Rebuilds are replace-wholesale: the existing collection is deleted and a
//! fresh one is created from the chunk export, so a collection never mixes
//! vectors from different builds or different embedding models.

use chrono::Utc;
use ragrelay_common::chunks::ChunkRecord;
use ragrelay_common::errors::{AppError, Result};
use ragrelay_common::store::{ChunkBatch, CollectionMetadata, VectorStore};
use ragrelay_common::{metrics, Embedder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Chunks per add() call
const ADD_BATCH_SIZE: usize = 100;

/// Outcome of one index build
#[derive(Debug)]
pub struct BuildReport {
    pub collection: String,
    pub total_chunks: usize,
    pub embedding_model: String,
    pub duration_secs: f64,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed all chunks and rebuild the collection from scratch
    #[tracing::instrument(skip(self, chunks))]
    pub async fn build(&self, collection: &str, chunks: &[ChunkRecord]) -> Result<BuildReport> {
        if chunks.is_empty() {
            return Err(AppError::Indexing {
                message: "chunk export contains no chunks".to_string(),
            });
        }

        let started = Instant::now();

        info!(
            collection = %collection,
            chunks = chunks.len(),
            model = %self.embedder.model_name(),
            "Embedding chunk corpus"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embed_started = Instant::now();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        metrics::record_embedding(
            embed_started.elapsed().as_secs_f64(),
            self.embedder.model_name(),
        );

        if embeddings.len() != chunks.len() {
            return Err(AppError::Indexing {
                message: format!(
                    "embedding count mismatch: {} chunks, {} vectors",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        let expected = self.embedder.dimension();
        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            if embedding.len() != expected {
                return Err(AppError::Indexing {
                    message: format!(
                        "vector for {} has dimension {} (expected {})",
                        chunk.id,
                        embedding.len(),
                        expected
                    ),
                });
            }
        }

        // Replace wholesale: delete first, then create with fresh metadata
        self.store.delete_collection(collection).await?;
        let handle = self
            .store
            .create_collection(
                collection,
                CollectionMetadata {
                    embedding_model: self.embedder.model_name().to_string(),
                    total_chunks: chunks.len(),
                    created_at: Utc::now(),
                },
            )
            .await?;

        let mut added = 0usize;
        for (chunk_batch, vector_batch) in chunks
            .chunks(ADD_BATCH_SIZE)
            .zip(embeddings.chunks(ADD_BATCH_SIZE))
        {
            let batch = ChunkBatch {
                ids: chunk_batch.iter().map(|c| c.id.clone()).collect(),
                embeddings: vector_batch.to_vec(),
                documents: chunk_batch.iter().map(|c| c.content.clone()).collect(),
                metadatas: chunk_batch.iter().map(|c| c.metadata.clone()).collect(),
            };
            self.store.add(&handle, batch).await?;
            added += chunk_batch.len();
            debug!(added, total = chunks.len(), "Batch added");
        }

        let stored = self.store.count(&handle).await?;
        if stored != chunks.len() {
            return Err(AppError::Indexing {
                message: format!(
                    "collection '{}' holds {} chunks after build (expected {})",
                    collection,
                    stored,
                    chunks.len()
                ),
            });
        }

        let duration_secs = started.elapsed().as_secs_f64();
        info!(
            collection = %collection,
            chunks = stored,
            duration_secs,
            "Index build complete"
        );

        Ok(BuildReport {
            collection: collection.to_string(),
            total_chunks: stored,
            embedding_model: self.embedder.model_name().to_string(),
            duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragrelay_common::embeddings::MockEmbedder;
    use ragrelay_common::store::MemoryStore;

    fn sample_chunks(n: usize) -> Vec<ChunkRecord> {
        (0..n)
            .map(|i| ChunkRecord::new(i, format!("chunk content {}", i), "a.txt".into(), i))
            .collect()
    }

    #[tokio::test]
    async fn test_build_populates_collection_with_metadata() {
        let store = Arc::new(MemoryStore::new());
        let builder = IndexBuilder::new(Arc::new(MockEmbedder::new(16)), store.clone());

        let report = builder.build("docs", &sample_chunks(250)).await.unwrap();
        assert_eq!(report.total_chunks, 250);
        assert_eq!(report.embedding_model, "mock-embedding");

        let handle = store.get_collection("docs").await.unwrap();
        assert_eq!(handle.metadata.embedding_model, "mock-embedding");
        assert_eq!(handle.metadata.total_chunks, 250);
        assert_eq!(store.count(&handle).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_collection() {
        let store = Arc::new(MemoryStore::new());
        let builder = IndexBuilder::new(Arc::new(MockEmbedder::new(16)), store.clone());

        builder.build("docs", &sample_chunks(10)).await.unwrap();
        builder.build("docs", &sample_chunks(3)).await.unwrap();

        let handle = store.get_collection("docs").await.unwrap();
        assert_eq!(store.count(&handle).await.unwrap(), 3);
        assert_eq!(handle.metadata.total_chunks, 3);
    }

    #[tokio::test]
    async fn test_empty_export_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let builder = IndexBuilder::new(Arc::new(MockEmbedder::new(16)), store);

        let err = builder.build("docs", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Indexing { .. }));
    }

    /// Embedder that returns vectors of varying length
    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        async fn embed(&self, _text: &str) -> ragrelay_common::Result<Vec<f32>> {
            Ok(vec![0.0; 8])
        }

        async fn embed_batch(&self, texts: &[String]) -> ragrelay_common::Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![0.0; if i % 2 == 0 { 8 } else { 7 }])
                .collect())
        }

        fn model_name(&self) -> &str {
            "ragged"
        }

        fn dimension(&self) -> usize {
            8
        }
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_before_store_writes() {
        let store = Arc::new(MemoryStore::new());
        let builder = IndexBuilder::new(Arc::new(RaggedEmbedder), store.clone());

        let err = builder.build("docs", &sample_chunks(4)).await.unwrap_err();
        assert!(matches!(err, AppError::Indexing { .. }));
        // Nothing was written: the collection was never created
        assert!(store.get_collection("docs").await.is_err());
    }
}
