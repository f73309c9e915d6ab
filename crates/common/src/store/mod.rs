//! Vector store abstraction
//!
//! The store persists chunk text + metadata + vectors together, so retrieval
//! never re-reads the source documents. `ChromaStore` speaks the Chroma HTTP
//! API; `MemoryStore` is an in-process brute-force implementation used by
//! tests.
//!
//! Rebuilds are delete-then-create: a collection is replaced wholesale, never
//! merged, so every chunk in it shares one embedding-model identity and one
//! build generation.

use crate::chunks::ChunkMetadata;
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metadata stored alongside a collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionMetadata {
    /// Identity of the embedding model used to build the collection
    pub embedding_model: String,

    /// Chunk count at build time
    pub total_chunks: usize,

    /// Build timestamp
    pub created_at: DateTime<Utc>,
}

/// Handle to an opened collection
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    /// Store-assigned collection id
    pub id: String,

    /// Collection name
    pub name: String,

    /// Collection metadata
    pub metadata: CollectionMetadata,
}

/// Parallel arrays for one add() call
#[derive(Debug, Clone)]
pub struct ChunkBatch {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
}

/// One nearest-neighbor match
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    pub content: String,
    pub distance: f32,
    pub metadata: ChunkMetadata,
}

/// Vector store operations required by the pipeline
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection; fails if one with the same name exists
    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<CollectionHandle>;

    /// Delete a collection; deleting a missing collection is not an error
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Open an existing collection
    async fn get_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Add a batch of chunks with their vectors
    async fn add(&self, collection: &CollectionHandle, batch: ChunkBatch) -> Result<()>;

    /// Nearest-neighbor query, ascending by distance
    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>>;

    /// Number of chunks in the collection
    async fn count(&self, collection: &CollectionHandle) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Chroma HTTP client
// ---------------------------------------------------------------------------

/// Client for the Chroma HTTP API
pub struct ChromaStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
    metadata: Option<CollectionMetadata>,
}

#[derive(Serialize)]
struct CreateCollectionBody<'a> {
    name: &'a str,
    metadata: &'a CollectionMetadata,
    get_or_create: bool,
}

#[derive(Serialize)]
struct AddBody {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    documents: Vec<Vec<String>>,
    distances: Vec<Vec<f32>>,
    metadatas: Vec<Vec<ChunkMetadata>>,
}

impl ChromaStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build store HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn handle_from(&self, collection: ChromaCollection) -> Result<CollectionHandle> {
        let metadata = collection.metadata.ok_or_else(|| AppError::Configuration {
            message: format!(
                "collection '{}' has no embedding-model metadata; rebuild it with the indexer",
                collection.name
            ),
        })?;
        Ok(CollectionHandle {
            id: collection.id,
            name: collection.name,
            metadata,
        })
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<CollectionHandle> {
        let body = CreateCollectionBody {
            name,
            metadata: &metadata,
            get_or_create: false,
        };

        let response = self
            .client
            .post(self.url("collections"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("create collection failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Store {
                message: format!("create collection '{}' failed ({}): {}", name, status, text),
            });
        }

        let collection: ChromaCollection = response.json().await.map_err(|e| AppError::Store {
            message: format!("failed to parse create response: {}", e),
        })?;
        self.handle_from(collection)
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("collections/{}", name)))
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("delete collection failed: {}", e),
            })?;

        // Deleting a collection that does not exist is fine
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(AppError::Store {
            message: format!("delete collection '{}' failed ({}): {}", name, status, text),
        })
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}", name)))
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("get collection failed: {}", e),
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::CollectionNotFound {
                name: name.to_string(),
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Store {
                message: format!("get collection '{}' failed ({}): {}", name, status, text),
            });
        }

        let collection: ChromaCollection = response.json().await.map_err(|e| AppError::Store {
            message: format!("failed to parse collection: {}", e),
        })?;
        self.handle_from(collection)
    }

    async fn add(&self, collection: &CollectionHandle, batch: ChunkBatch) -> Result<()> {
        let body = AddBody {
            ids: batch.ids,
            embeddings: batch.embeddings,
            documents: batch.documents,
            metadatas: batch.metadatas,
        };

        let response = self
            .client
            .post(self.url(&format!("collections/{}/add", collection.id)))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("add failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Store {
                message: format!("add to '{}' failed ({}): {}", collection.name, status, text),
            });
        }

        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let body = QueryBody {
            query_embeddings: vec![vector],
            n_results: top_k,
            include: ["documents", "distances", "metadatas"],
        };

        let response = self
            .client
            .post(self.url(&format!("collections/{}/query", collection.id)))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("query failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Store {
                message: format!("query on '{}' failed ({}): {}", collection.name, status, text),
            });
        }

        let result: QueryResponse = response.json().await.map_err(|e| AppError::Store {
            message: format!("failed to parse query response: {}", e),
        })?;

        // One query vector in, one parallel-array result row out
        let ids = result.ids.into_iter().next().unwrap_or_default();
        let documents = result.documents.into_iter().next().unwrap_or_default();
        let distances = result.distances.into_iter().next().unwrap_or_default();
        let metadatas = result.metadatas.into_iter().next().unwrap_or_default();

        Ok(ids
            .into_iter()
            .zip(documents)
            .zip(distances)
            .zip(metadatas)
            .map(|(((id, content), distance), metadata)| QueryMatch {
                id,
                content,
                distance,
                metadata,
            })
            .collect())
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}/count", collection.id)))
            .send()
            .await
            .map_err(|e| AppError::Store {
                message: format!("count failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Store {
                message: format!("count on '{}' failed ({}): {}", collection.name, status, text),
            });
        }

        response.json().await.map_err(|e| AppError::Store {
            message: format!("failed to parse count: {}", e),
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory store for tests
// ---------------------------------------------------------------------------

/// Brute-force in-process store (squared-L2 distance, ascending)
#[derive(Default)]
pub struct MemoryStore {
    collections: std::sync::Mutex<std::collections::HashMap<String, MemCollection>>,
}

struct MemCollection {
    metadata: CollectionMetadata,
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> Result<CollectionHandle> {
        let mut collections = self.collections.lock().unwrap();
        if collections.contains_key(name) {
            return Err(AppError::Store {
                message: format!("collection '{}' already exists", name),
            });
        }
        collections.insert(
            name.to_string(),
            MemCollection {
                metadata: metadata.clone(),
                ids: Vec::new(),
                embeddings: Vec::new(),
                documents: Vec::new(),
                metadatas: Vec::new(),
            },
        );
        Ok(CollectionHandle {
            id: name.to_string(),
            name: name.to_string(),
            metadata,
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.lock().unwrap().remove(name);
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<CollectionHandle> {
        let collections = self.collections.lock().unwrap();
        let collection = collections
            .get(name)
            .ok_or_else(|| AppError::CollectionNotFound {
                name: name.to_string(),
            })?;
        Ok(CollectionHandle {
            id: name.to_string(),
            name: name.to_string(),
            metadata: collection.metadata.clone(),
        })
    }

    async fn add(&self, collection: &CollectionHandle, batch: ChunkBatch) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let target = collections
            .get_mut(&collection.name)
            .ok_or_else(|| AppError::CollectionNotFound {
                name: collection.name.clone(),
            })?;

        if let Some(first) = target.embeddings.first().or(batch.embeddings.first()) {
            let dim = first.len();
            if batch.embeddings.iter().any(|e| e.len() != dim) {
                return Err(AppError::Store {
                    message: format!("inconsistent vector dimension (expected {})", dim),
                });
            }
        }

        target.ids.extend(batch.ids);
        target.embeddings.extend(batch.embeddings);
        target.documents.extend(batch.documents);
        target.metadatas.extend(batch.metadatas);
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionHandle,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        let collections = self.collections.lock().unwrap();
        let target = collections
            .get(&collection.name)
            .ok_or_else(|| AppError::CollectionNotFound {
                name: collection.name.clone(),
            })?;

        let mut matches: Vec<QueryMatch> = target
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, embedding)| QueryMatch {
                id: target.ids[i].clone(),
                content: target.documents[i].clone(),
                distance: squared_l2(vector, embedding),
                metadata: target.metadatas[i].clone(),
            })
            .collect();

        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn count(&self, collection: &CollectionHandle) -> Result<usize> {
        let collections = self.collections.lock().unwrap();
        let target = collections
            .get(&collection.name)
            .ok_or_else(|| AppError::CollectionNotFound {
                name: collection.name.clone(),
            })?;
        Ok(target.ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(model: &str) -> CollectionMetadata {
        CollectionMetadata {
            embedding_model: model.to_string(),
            total_chunks: 0,
            created_at: Utc::now(),
        }
    }

    fn batch(n: usize, dim: usize) -> ChunkBatch {
        ChunkBatch {
            ids: (0..n).map(|i| format!("chunk_{}", i)).collect(),
            embeddings: (0..n).map(|i| vec![i as f32; dim]).collect(),
            documents: (0..n).map(|i| format!("content {}", i)).collect(),
            metadatas: (0..n)
                .map(|i| ChunkMetadata {
                    source: "a.txt".into(),
                    chunk_index: i,
                    length: 9,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_query_is_ascending_by_distance() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("docs", metadata("mock-embedding"))
            .await
            .unwrap();
        store.add(&handle, batch(5, 4)).await.unwrap();

        let results = store.query(&handle, &[2.0; 4], 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "chunk_2");
        assert!(results[0].distance <= results[1].distance);
        assert!(results[1].distance <= results[2].distance);
    }

    #[tokio::test]
    async fn test_query_on_empty_collection_returns_empty() {
        let store = MemoryStore::new();
        let handle = store
            .create_collection("docs", metadata("mock-embedding"))
            .await
            .unwrap();
        let results = store.query(&handle, &[0.0; 4], 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_collection() {
        let store = MemoryStore::new();
        let err = store.get_collection("nope").await.unwrap_err();
        assert!(matches!(err, AppError::CollectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_create_duplicate_collection_fails() {
        let store = MemoryStore::new();
        store
            .create_collection("docs", metadata("mock-embedding"))
            .await
            .unwrap();
        let err = store
            .create_collection("docs", metadata("mock-embedding"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_collection_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete_collection("nope").await.is_ok());
    }
}
