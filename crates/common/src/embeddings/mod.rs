//! Embedding service abstraction
//!
//! The same model/version must be used at index time and query time; the
//! model identity is stored with each collection and checked by the
//! retriever. No automatic retries are performed here.

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Client for an OpenAI-compatible embeddings endpoint
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingsRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("failed to build embedding HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);

        let request = EmbeddingsRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| AppError::Embedding {
            message: format!("request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbeddingsResponse =
            response.json().await.map_err(|e| AppError::Embedding {
                message: format!("failed to parse response: {}", e),
            })?;

        Ok(result.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.request(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::Embedding {
            message: "empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.request(batch).await?;
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic embedder for testing. The vector depends only on the text,
/// so identical inputs always map to identical points.
pub struct MockEmbedder {
    model: String,
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "mock-embedding".to_string(),
            dimension,
        }
    }

    pub fn with_model(model: &str, dimension: usize) -> Self {
        Self {
            model: model.to_string(),
            dimension,
        }
    }

    fn encode(&self, text: &str) -> Vec<f32> {
        let seed: u32 = text.bytes().fold(0u32, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(b as u32)
        });
        (0..self.dimension)
            .map(|i| ((seed.wrapping_add(i as u32)) as f32).sin())
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.encode(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder from configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(HttpEmbedder::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedder_dimension() {
        let embedder = MockEmbedder::new(1024);
        let embedding = embedder.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 1024);
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("same input").await.unwrap();
        let b = embedder.embed("same input").await.unwrap();
        let c = embedder.embed("different input").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_mock_batch_matches_single() {
        let embedder = MockEmbedder::new(32);
        let texts = vec!["one".to_string(), "two".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").await.unwrap());
        assert_eq!(batch[1], embedder.embed("two").await.unwrap());
    }
}
