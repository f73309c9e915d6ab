//! Retrieval and context composition
//!
//! The retriever embeds a query with the same model that built the
//! collection and runs a top-k nearest-neighbor search; the composer formats
//! ranked results into a single budget-constrained context string.

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::store::{CollectionHandle, VectorStore};
use std::sync::Arc;
use std::time::Instant;

/// One ranked retrieval result (lower distance = more relevant)
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub distance: f32,
}

/// Query-time retrieval against one opened collection
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: CollectionHandle,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Open the named collection and verify its embedding-model identity
    /// against the live embedder. A mismatch is a correctness bug, not a
    /// quality degradation, so it fails fast.
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collection_name: &str,
    ) -> Result<Self> {
        let collection = store.get_collection(collection_name).await?;
        let retriever = Self {
            embedder,
            store,
            collection,
        };
        retriever.verify_model_identity()?;
        Ok(retriever)
    }

    /// Check that the collection was built with the embedder's model
    pub fn verify_model_identity(&self) -> Result<()> {
        let stored = &self.collection.metadata.embedding_model;
        let live = self.embedder.model_name();
        if stored != live {
            return Err(AppError::Configuration {
                message: format!(
                    "embedding model mismatch: collection '{}' was built with '{}' but the \
                     configured model is '{}'",
                    self.collection.name, stored, live
                ),
            });
        }
        Ok(())
    }

    /// Retrieve up to `top_k` chunks for a query, ascending by distance.
    /// An empty result set is a valid "no context available" outcome.
    #[tracing::instrument(skip(self, query), fields(collection = %self.collection.name))]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        self.verify_model_identity()?;

        let start = Instant::now();
        let query_embedding = self.embedder.embed(query).await?;
        let matches = self
            .store
            .query(&self.collection, &query_embedding, top_k)
            .await?;

        let results: Vec<RetrievalResult> = matches
            .into_iter()
            .map(|m| RetrievalResult {
                content: m.content,
                source: m.metadata.source,
                chunk_index: m.metadata.chunk_index,
                distance: m.distance,
            })
            .collect();

        crate::metrics::record_retrieval(start.elapsed().as_secs_f64(), results.len());

        tracing::debug!(
            collection = %self.collection.name,
            top_k,
            results = results.len(),
            "Retrieval completed"
        );

        Ok(results)
    }

    /// Live chunk count of the opened collection
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count(&self.collection).await
    }

    /// Name of the opened collection
    pub fn collection_name(&self) -> &str {
        &self.collection.name
    }

    /// Identity of the embedding model in use
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_name()
    }
}

/// Formats ranked retrieval results into one context string under a
/// character budget.
#[derive(Debug, Clone)]
pub struct ContextComposer {
    max_chars: usize,
}

/// Separator between included blocks
const BLOCK_SEPARATOR: &str = "\n\n";

impl ContextComposer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Iterate results in rank order, including each formatted block only if
    /// it fits the remaining budget; stop at the first block that would
    /// overflow. Blocks are never truncated mid-content. Returns an empty
    /// string when nothing fits.
    pub fn compose(&self, results: &[RetrievalResult]) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut total = 0usize;

        for (rank, result) in results.iter().enumerate() {
            let block = format!("Source {}: {}\n{}", rank + 1, result.source, result.content);
            let block_len = block.chars().count();

            let candidate = if blocks.is_empty() {
                total + block_len
            } else {
                total + BLOCK_SEPARATOR.len() + block_len
            };

            if candidate > self.max_chars {
                break;
            }

            total = candidate;
            blocks.push(block);
        }

        blocks.join(BLOCK_SEPARATOR)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::ChunkMetadata;
    use crate::embeddings::MockEmbedder;
    use crate::store::{ChunkBatch, CollectionMetadata, MemoryStore};
    use chrono::Utc;

    fn result(source: &str, content: String, distance: f32) -> RetrievalResult {
        RetrievalResult {
            content,
            source: source.to_string(),
            chunk_index: 0,
            distance,
        }
    }

    #[test]
    fn test_budget_includes_first_n_blocks_in_rank_order() {
        // Three 1800-char chunks against a 4000-char budget: only the first
        // two fit once labels and separators are counted.
        let results = vec![
            result("a.txt", "a".repeat(1800), 0.1),
            result("b.txt", "b".repeat(1800), 0.2),
            result("c.txt", "c".repeat(1800), 0.3),
        ];

        let composer = ContextComposer::new(4000);
        let context = composer.compose(&results);

        assert!(context.chars().count() <= 4000);
        assert!(context.contains("Source 1: a.txt"));
        assert!(context.contains("Source 2: b.txt"));
        assert!(!context.contains("c.txt"));

        let a_pos = context.find("a.txt").unwrap();
        let b_pos = context.find("b.txt").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn test_overflow_stops_rather_than_skipping_ahead() {
        // The second block overflows; the smaller third block must NOT be
        // pulled in past it.
        let results = vec![
            result("a.txt", "a".repeat(100), 0.1),
            result("b.txt", "b".repeat(500), 0.2),
            result("c.txt", "c".repeat(10), 0.3),
        ];

        let composer = ContextComposer::new(200);
        let context = composer.compose(&results);

        assert!(context.contains("a.txt"));
        assert!(!context.contains("b.txt"));
        assert!(!context.contains("c.txt"));
    }

    #[test]
    fn test_zero_fit_returns_empty_string() {
        let results = vec![result("a.txt", "a".repeat(100), 0.1)];
        let composer = ContextComposer::new(50);
        assert_eq!(composer.compose(&results), "");
    }

    #[test]
    fn test_no_results_returns_empty_string() {
        let composer = ContextComposer::new(4000);
        assert_eq!(composer.compose(&[]), "");
    }

    async fn seeded_store(model: &str) -> (Arc<MemoryStore>, CollectionHandle) {
        let store = Arc::new(MemoryStore::new());
        let handle = store
            .create_collection(
                "docs",
                CollectionMetadata {
                    embedding_model: model.to_string(),
                    total_chunks: 2,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let embedder = MockEmbedder::new(16);
        let texts = vec!["alpha content".to_string(), "beta content".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        store
            .add(
                &handle,
                ChunkBatch {
                    ids: vec!["chunk_0".into(), "chunk_1".into()],
                    embeddings,
                    documents: texts,
                    metadatas: vec![
                        ChunkMetadata {
                            source: "a.txt".into(),
                            chunk_index: 0,
                            length: 13,
                        },
                        ChunkMetadata {
                            source: "a.txt".into(),
                            chunk_index: 1,
                            length: 12,
                        },
                    ],
                },
            )
            .await
            .unwrap();

        (store, handle)
    }

    #[tokio::test]
    async fn test_retriever_finds_matching_chunk() {
        let (store, _) = seeded_store("mock-embedding").await;
        let retriever = Retriever::open(Arc::new(MockEmbedder::new(16)), store, "docs")
            .await
            .unwrap();

        // Identical text embeds to an identical point, so it ranks first
        let results = retriever.retrieve("alpha content", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "alpha content");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_model_identity_mismatch_fails_fast() {
        let (store, _) = seeded_store("some-other-model").await;
        let err = Retriever::open(Arc::new(MockEmbedder::new(16)), store, "docs")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_empty_collection_yields_empty_results() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_collection(
                "docs",
                CollectionMetadata {
                    embedding_model: "mock-embedding".into(),
                    total_chunks: 0,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let retriever = Retriever::open(Arc::new(MockEmbedder::new(16)), store, "docs")
            .await
            .unwrap();
        let results = retriever.retrieve("anything", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
