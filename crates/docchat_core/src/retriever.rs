//! crates/docchat_core/src/retriever.rs
//!
//! Turns a natural-language query into the most similar chunks of one session.

use crate::domain::ScoredChunk;
use crate::ports::{ChunkStore, EmbeddingService, PortError, PortResult};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingService>,
    chunks: Arc<dyn ChunkStore>,
    min_similarity: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingService>, chunks: Arc<dyn ChunkStore>) -> Self {
        Self {
            embedder,
            chunks,
            min_similarity: None,
        }
    }

    /// Drops results scoring below `min_similarity`.
    pub fn with_min_similarity(mut self, min_similarity: Option<f32>) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Returns up to `k` chunks of `session_id`, highest score first.
    ///
    /// A session without chunks yields an empty list without calling the embedder.
    pub async fn retrieve(
        &self,
        session_id: Uuid,
        query_text: &str,
        k: usize,
    ) -> PortResult<Vec<ScoredChunk>> {
        if k == 0 || self.chunks.count_chunks(session_id).await? == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed(&[query_text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortError::EmbeddingUnavailable("no vector returned for the query".to_string())
            })?;

        let mut results = self.chunks.query(session_id, &query_vector, k).await?;
        if let Some(floor) = self.min_similarity {
            results.retain(|c| c.score >= floor);
        }
        Ok(results)
    }
}
