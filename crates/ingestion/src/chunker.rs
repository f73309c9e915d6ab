//! Text chunking
//!
//! Splits documents into overlapping windows. Text is split on the coarsest
//! separator that yields pieces small enough to merge into a chunk of at most
//! `chunk_size` characters; oversized atomic units fall back to the next
//! finer separator, down to character-level splitting. Consecutive chunks
//! re-include the trailing `chunk_overlap` characters of the previous chunk.
//!
//! All sizes are Unicode scalar counts, not bytes.

use crate::errors::IngestionError;
use crate::loader::Document;
use ragrelay_common::chunks::ChunkRecord;
use ragrelay_common::config::ChunkingConfig;
use tracing::{debug, info};

/// Separator priority: paragraph, line, sentence, word, then characters
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split documents into overlapping chunks
pub fn chunk_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Result<Vec<ChunkRecord>, IngestionError> {
    if documents.is_empty() {
        return Err(IngestionError::EmptyInput);
    }
    if config.chunk_overlap >= config.chunk_size {
        return Err(IngestionError::ChunkingError(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    let mut records = Vec::new();
    let mut sequence = 0usize;

    for document in documents {
        let pieces = split_text(&document.content, config.chunk_size, config.chunk_overlap);
        debug!(
            source = %document.source,
            chunks = pieces.len(),
            "Document chunked"
        );

        for (chunk_index, content) in pieces.into_iter().enumerate() {
            records.push(ChunkRecord::new(
                sequence,
                content,
                document.source.clone(),
                chunk_index,
            ));
            sequence += 1;
        }
    }

    info!(
        documents = documents.len(),
        chunks = records.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "Chunking complete"
    );

    Ok(records)
}

/// Split one document into overlapping chunks of at most `size` characters
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    // A document shorter than the chunk size yields exactly one chunk
    if char_len(trimmed) <= size {
        return vec![trimmed.to_string()];
    }

    let pieces = split_pieces(text, &SEPARATORS, size);

    // Greedy merge: grow the current chunk until the next piece would push it
    // past `size`, then close it and seed the next chunk with the trailing
    // `overlap` characters of the one just closed.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        let piece_len = char_len(&piece);
        if !current.is_empty() && char_len(&current) + piece_len > size {
            let finished = current.trim().to_string();
            let mut carry = tail_chars(&finished, overlap);
            // Trim the carry if the next piece would not fit beside it
            let budget = size.saturating_sub(piece_len);
            if char_len(&carry) > budget {
                carry = tail_chars(&carry, budget);
            }
            if !finished.is_empty() {
                chunks.push(finished);
            }
            current = carry;
        }
        current.push_str(&piece);
    }

    let last = current.trim().to_string();
    if !last.is_empty() {
        chunks.push(last);
    }

    chunks
}

/// Recursively split text into pieces of at most `size` characters, using
/// the coarsest separator that applies and falling back to finer ones for
/// oversized atomic units.
fn split_pieces(text: &str, separators: &[&str], size: usize) -> Vec<String> {
    if char_len(text) <= size {
        return vec![text.to_string()];
    }

    let Some((separator, finer)) = separators.split_first() else {
        // Character-level fallback: the only way an atomic unit gets smaller
        return char_split(text, size);
    };

    let parts: Vec<&str> = text.split_inclusive(*separator).collect();
    if parts.len() <= 1 {
        return split_pieces(text, finer, size);
    }

    let mut pieces = Vec::new();
    for part in parts {
        if char_len(part) > size {
            pieces.extend(split_pieces(part, finer, size));
        } else {
            pieces.push(part.to_string());
        }
    }
    pieces
}

/// Split into fixed-size character windows (respects char boundaries)
fn char_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|window| window.iter().collect())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of a string
fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    if len <= n {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}
