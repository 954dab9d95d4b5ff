//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use chrono::{DateTime, Utc};
use docchat_core::domain::{Document, Message, SessionSummary};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: Uploads are multipart forms with a `session_id` text part and one or more
// `files` parts, so they have no JSON counterpart here.
//=========================================================================================

/// A single chat turn.
#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

/// Optional query parameters of the chat history endpoint.
#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only return the most recent `limit` exchanges.
    pub limit: Option<usize>,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub message: String,
}

/// A PDF that was accepted by an upload.
#[derive(Serialize, ToSchema, Debug)]
pub struct UploadedPdf {
    pub id: i64,
    pub filename: String,
    pub text_preview: String,
    pub chunks_created: u64,
    pub file_size: u64,
}

/// Files that could not be processed are reported in `warnings` rather than failing
/// the whole batch.
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub uploaded_pdfs: Vec<UploadedPdf>,
    pub total_uploaded: usize,
    pub warnings: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PdfInfo {
    pub id: i64,
    pub original_filename: String,
    pub file_size: u64,
    pub upload_time: DateTime<Utc>,
    pub chunk_count: u64,
}

impl From<Document> for PdfInfo {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            original_filename: document.original_filename,
            file_size: document.file_size,
            upload_time: document.upload_time,
            chunk_count: document.chunk_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PdfListResponse {
    pub success: bool,
    pub pdfs: Vec<PdfInfo>,
}

/// Acknowledges an operation that returns no data.
#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub reply: String,
    pub response_time_ms: u64,
    /// Whether any retrieved document context reached the model.
    pub context_used: bool,
    /// Distinct documents that contributed context.
    pub sources_count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryMessage {
    pub id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub context_used: bool,
    pub sources_count: usize,
    pub relevant_pdfs: Vec<i64>,
}

impl From<Message> for HistoryMessage {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            user_message: message.user_message,
            bot_response: message.bot_response,
            timestamp: message.timestamp,
            response_time_ms: message.response_time_ms,
            context_used: message.context_used,
            sources_count: message.sources_count,
            relevant_pdfs: message.relevant_document_ids,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub messages: Vec<HistoryMessage>,
    pub total_messages: usize,
}

#[derive(Serialize, ToSchema)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub pdf_count: u64,
    pub message_count: u64,
}

impl From<SessionSummary> for SessionInfo {
    fn from(summary: SessionSummary) -> Self {
        Self {
            session_id: summary.session.id,
            created_at: summary.session.created_at,
            last_activity: summary.session.last_activity,
            pdf_count: summary.pdf_count,
            message_count: summary.message_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionInfoResponse {
    pub success: bool,
    pub session: SessionInfo,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
