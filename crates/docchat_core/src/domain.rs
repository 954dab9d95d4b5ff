//! crates/docchat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A tenancy boundary grouping one user's documents and conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// A session together with the counts shown by the session info endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session: Session,
    pub pdf_count: u64,
    pub message_count: u64,
}

/// What clearing a session removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearedSession {
    pub messages: u64,
    pub documents: u64,
}

/// An uploaded PDF whose text has been extracted and chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Monotonic per database, so it also encodes creation order.
    pub id: i64,
    pub session_id: Uuid,
    pub original_filename: String,
    pub file_size: u64,
    pub upload_time: DateTime<Utc>,
    pub chunk_count: u64,
}

/// The attributes of a document before it has been persisted.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub original_filename: String,
    pub file_size: u64,
}

/// A chunk of document text and its embedding, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A persisted chunk as read back for similarity ranking.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub chunk_id: i64,
    pub document_id: i64,
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A chunk returned from a similarity query, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: i64,
    pub document_id: i64,
    pub document_name: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

/// One completed chat exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub session_id: Uuid,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub context_used: bool,
    pub sources_count: usize,
    /// Documents that contributed retrieved context to the reply.
    pub relevant_document_ids: Vec<i64>,
}

/// A chat exchange waiting to be appended to the conversation store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub user_message: String,
    pub bot_response: String,
    pub response_time_ms: u64,
    pub context_used: bool,
    pub sources_count: usize,
    pub relevant_document_ids: Vec<i64>,
}

/// Plain text extracted from a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
    /// Pages that yielded no text, typically scanned images.
    pub empty_pages: usize,
}
