//! Chunk data model and export format
//!
//! A chunk is the atomic retrievable text unit. Builds are exported as JSON,
//! both as a timestamped snapshot and as a `chunks_latest.json` pointer file
//! with identical content, so the indexer never re-reads source documents.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the "latest" pointer file
pub const LATEST_EXPORT: &str = "chunks_latest.json";

/// Metadata attached to every chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    /// Source document identifier (file name)
    pub source: String,

    /// Position of this chunk within its document
    pub chunk_index: usize,

    /// Content length in characters
    pub length: usize,
}

/// A text chunk produced by the chunker; never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRecord {
    /// Stable id, unique within one build (`chunk_<n>`)
    pub id: String,

    /// The chunk content
    pub content: String,

    /// Chunk metadata
    pub metadata: ChunkMetadata,

    /// Content length in characters
    pub length: usize,
}

impl ChunkRecord {
    pub fn new(sequence: usize, content: String, source: String, chunk_index: usize) -> Self {
        let length = content.chars().count();
        Self {
            id: format!("chunk_{}", sequence),
            metadata: ChunkMetadata {
                source,
                chunk_index,
                length,
            },
            length,
            content,
        }
    }
}

/// Persisted chunk export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkExport {
    pub timestamp: DateTime<Utc>,
    pub total_chunks: usize,
    pub chunks: Vec<ChunkRecord>,
}

impl ChunkExport {
    pub fn new(chunks: Vec<ChunkRecord>) -> Self {
        Self {
            timestamp: Utc::now(),
            total_chunks: chunks.len(),
            chunks,
        }
    }

    /// Write the export as a timestamped snapshot plus the latest pointer
    /// file. Both files carry identical content.
    pub fn write_snapshot(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let stamp = self.timestamp.format("%Y%m%d_%H%M%S");
        let snapshot = dir.join(format!("chunks_{}.json", stamp));
        let latest = dir.join(LATEST_EXPORT);

        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(&snapshot, &body)?;
        std::fs::write(&latest, &body)?;

        Ok(snapshot)
    }

    /// Load an export file
    pub fn load(path: &Path) -> Result<Self> {
        let body = std::fs::read(path).map_err(|e| AppError::Configuration {
            message: format!("chunk export not found at {}: {}", path.display(), e),
        })?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Load the latest export from a chunks directory
    pub fn load_latest(dir: &Path) -> Result<Self> {
        Self::load(&dir.join(LATEST_EXPORT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<ChunkRecord> {
        vec![
            ChunkRecord::new(0, "first chunk".into(), "a.txt".into(), 0),
            ChunkRecord::new(1, "second chunk".into(), "a.txt".into(), 1),
        ]
    }

    #[test]
    fn test_chunk_ids_are_stable_and_unique() {
        let chunks = sample_chunks();
        assert_eq!(chunks[0].id, "chunk_0");
        assert_eq!(chunks[1].id, "chunk_1");
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        let chunk = ChunkRecord::new(0, "héllo".into(), "a.txt".into(), 0);
        assert_eq!(chunk.length, 5);
        assert_eq!(chunk.metadata.length, 5);
    }

    #[test]
    fn test_snapshot_and_latest_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let export = ChunkExport::new(sample_chunks());

        let snapshot = export.write_snapshot(dir.path()).unwrap();
        let latest = dir.path().join(LATEST_EXPORT);

        let a = std::fs::read(&snapshot).unwrap();
        let b = std::fs::read(&latest).unwrap();
        assert_eq!(a, b);

        let loaded = ChunkExport::load_latest(dir.path()).unwrap();
        assert_eq!(loaded.total_chunks, 2);
        assert_eq!(loaded.chunks, export.chunks);
    }

    #[test]
    fn test_load_missing_export_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChunkExport::load_latest(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
