//! crates/docchat_core/src/similarity.rs
//!
//! Brute-force cosine ranking used by chunk store implementations.

use crate::domain::{ScoredChunk, StoredChunk};
use std::cmp::Ordering;

/// Cosine similarity between two vectors. Mismatched or zero-length vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Scores every candidate against `query` and keeps the best `k`.
///
/// Equal scores are ordered by chunk index, then by document id (creation order),
/// so results are deterministic.
pub fn rank_chunks(query: &[f32], candidates: Vec<StoredChunk>, k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|c| ScoredChunk {
            score: cosine_similarity(query, &c.embedding),
            chunk_id: c.chunk_id,
            document_id: c.document_id,
            document_name: c.document_name,
            chunk_index: c.chunk_index,
            text: c.text,
        })
        .collect();

    scored.sort_by(compare_ranked);
    scored.truncate(k);
    scored
}

fn compare_ranked(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.chunk_index.cmp(&b.chunk_index))
        .then(a.document_id.cmp(&b.document_id))
        .then(a.chunk_id.cmp(&b.chunk_id))
}

/// Serializes an embedding as little-endian `f32` bytes for BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`embedding_to_bytes`]. Trailing bytes that do not form an `f32` are ignored.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
