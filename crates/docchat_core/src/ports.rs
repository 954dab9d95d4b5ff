//! crates/docchat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    ClearedSession, Document, ExtractedText, Message, NewChunk, NewDocument, NewMessage,
    ScoredChunk, Session, SessionSummary,
};
use crate::prompt::Prompt;
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Could not read PDF: {0}")]
    UnreadablePdf(String),
    #[error("Invalid chunk configuration: overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },
    #[error("Embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("Language model unavailable: {0}")]
    LlmUnavailable(String),
    #[error("Language model did not answer within {0} seconds")]
    LlmTimeout(u64),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl PortError {
    /// A stable, enumerable identifier for the error, safe to expose to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            PortError::InvalidInput(_) => "invalid_input",
            PortError::NotFound(_) => "not_found",
            PortError::UnreadablePdf(_) => "unreadable_pdf",
            PortError::InvalidChunkConfig { .. } => "invalid_chunk_config",
            PortError::EmbeddingUnavailable(_) => "embedding_unavailable",
            PortError::LlmUnavailable(_) => "llm_unavailable",
            PortError::LlmTimeout(_) => "llm_timeout",
            PortError::Storage(_) => "storage_failure",
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Persistence Ports
//=========================================================================================

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self) -> PortResult<Session>;

    /// Fails with `NotFound` for an unknown id.
    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    /// Returns the session, creating it on first sight, and records activity.
    async fn touch_session(&self, session_id: Uuid) -> PortResult<Session>;

    async fn session_summary(&self, session_id: Uuid) -> PortResult<SessionSummary>;

    /// All documents of a session in upload order.
    async fn list_documents(&self, session_id: Uuid) -> PortResult<Vec<Document>>;

    /// Removes the conversation and every document of the session in one transaction.
    ///
    /// Chunks go with their documents; the session itself remains.
    async fn clear_session(&self, session_id: Uuid) -> PortResult<ClearedSession>;
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persists a document and all of its chunks atomically.
    async fn store_document(
        &self,
        session_id: Uuid,
        document: NewDocument,
        chunks: Vec<NewChunk>,
    ) -> PortResult<Document>;

    /// Persists a single chunk under an existing document of the session.
    async fn put(&self, session_id: Uuid, document_id: i64, chunk: NewChunk) -> PortResult<i64>;

    /// The `k` chunks of this session most similar to `vector`.
    ///
    /// Never returns chunks belonging to another session.
    async fn query(&self, session_id: Uuid, vector: &[f32], k: usize)
        -> PortResult<Vec<ScoredChunk>>;

    /// Deletes a document of the session and all of its chunks.
    async fn delete_document(&self, session_id: Uuid, document_id: i64) -> PortResult<()>;

    async fn count_chunks(&self, session_id: Uuid) -> PortResult<u64>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Atomically appends one completed exchange.
    async fn append(&self, message: NewMessage) -> PortResult<Message>;

    /// Exchanges in chronological order. With a limit, only the most recent ones.
    async fn history(&self, session_id: Uuid, limit: Option<usize>) -> PortResult<Vec<Message>>;

    async fn clear(&self, session_id: Uuid) -> PortResult<u64>;
}

//=========================================================================================
// External Capability Ports
//=========================================================================================

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces the assistant reply for an assembled prompt.
    async fn generate(&self, prompt: &Prompt) -> PortResult<String>;
}

/// Converts raw PDF bytes into plain text. CPU-bound, so callers run it off the async path.
pub trait TextExtractor: Send + Sync {
    /// Fails with `UnreadablePdf` when the bytes are not a PDF or carry no text layer.
    fn extract(&self, pdf_bytes: &[u8]) -> PortResult<ExtractedText>;
}
