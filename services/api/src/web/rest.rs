//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorResponse};
use crate::web::{
    chat_task::chat_turn,
    ingest_task::{ingest_pdf, UploadedFile, MAX_FILES_PER_UPLOAD},
    protocol::{
        ChatRequest, ChatResponse, CreateSessionResponse, HealthResponse, HistoryMessage,
        HistoryQuery, HistoryResponse, PdfInfo, PdfListResponse, SessionInfo,
        SessionInfoResponse, SuccessResponse, UploadResponse, UploadedPdf,
    },
    state::AppState,
};
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bytes::BytesMut;
use docchat_core::ports::PortError;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        upload_pdf_handler,
        get_pdfs_handler,
        remove_pdf_handler,
        chat_handler,
        get_chat_history_handler,
        clear_chat_handler,
        session_info_handler,
        health_handler,
    ),
    components(
        schemas(
            CreateSessionResponse,
            UploadResponse,
            UploadedPdf,
            PdfListResponse,
            PdfInfo,
            SuccessResponse,
            ChatRequest,
            ChatResponse,
            HistoryResponse,
            HistoryMessage,
            SessionInfoResponse,
            SessionInfo,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Document Chat API", description = "Upload medical PDFs and chat about their content.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Helpers
//=========================================================================================

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| PortError::InvalidInput(format!("Invalid session id '{}'", raw)).into())
}

/// Longest accepted `session_id` form value, in bytes.
const MAX_SESSION_FIELD_BYTES: usize = 128;

fn malformed_multipart(e: impl std::fmt::Display) -> ApiError {
    PortError::InvalidInput(format!("Malformed multipart body: {}", e)).into()
}

/// Reads the `session_id` text part without buffering an unbounded value.
async fn read_session_field(mut field: Field<'_>) -> Result<String, ApiError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed_multipart)? {
        if buffer.len() + chunk.len() > MAX_SESSION_FIELD_BYTES {
            return Err(PortError::InvalidInput("Session ID is too long".to_string()).into());
        }
        buffer.extend_from_slice(&chunk);
    }
    String::from_utf8(buffer.to_vec())
        .map_err(|_| PortError::InvalidInput("Session ID must be UTF-8 text".to_string()).into())
}

/// Consumes a part without keeping any of it.
async fn drain_field(mut field: Field<'_>) -> Result<(), ApiError> {
    while field.chunk().await.map_err(malformed_multipart)?.is_some() {}
    Ok(())
}

/// Reads a file part, keeping at most `max_bytes` of it in memory.
///
/// Oversized parts are drained and flagged so the rest of the batch can proceed.
async fn read_file_field(mut field: Field<'_>, max_bytes: usize) -> Result<UploadedFile, ApiError> {
    let filename = field.file_name().unwrap_or("untitled.pdf").to_string();
    let content_type = field.content_type().map(str::to_string);

    let mut buffer = BytesMut::new();
    let mut size = 0usize;
    let mut oversized = false;
    while let Some(chunk) = field.chunk().await.map_err(malformed_multipart)? {
        size += chunk.len();
        if size > max_bytes {
            oversized = true;
            buffer.clear();
        } else {
            buffer.extend_from_slice(&chunk);
        }
    }

    Ok(UploadedFile {
        filename,
        content_type,
        bytes: buffer.freeze(),
        size,
        oversized,
    })
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Create a new chat session.
#[utoipa::path(
    post,
    path = "/create_session",
    responses(
        (status = 200, description = "Session created", body = CreateSessionResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session = app_state.sessions.create_session().await?;
    info!(session_id = %session.id, "Session created");
    Ok(Json(CreateSessionResponse {
        success: true,
        session_id: session.id,
        message: "Session created successfully".to_string(),
    }))
}

/// Describe a session: timestamps plus document and message counts.
#[utoipa::path(
    get,
    path = "/session_info/{session_id}",
    params(("session_id" = String, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Session details", body = SessionInfoResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn session_info_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfoResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let summary = app_state.sessions.session_summary(session_id).await?;
    Ok(Json(SessionInfoResponse {
        success: true,
        session: summary.into(),
    }))
}

//=========================================================================================
// Document Handlers
//=========================================================================================

/// Upload one or more PDFs into a session.
///
/// Expects a multipart form with a `session_id` text part and one or more `files`
/// parts. Files that cannot be processed are reported in `warnings`; the others are
/// still ingested. The request body has no overall size limit: each file part is
/// capped while it streams in, and parts beyond `MAX_FILES_PER_UPLOAD` are skipped.
#[utoipa::path(
    post,
    path = "/upload_pdf",
    request_body(content_type = "multipart/form-data", description = "A `session_id` field and one or more `files` parts."),
    responses(
        (status = 200, description = "Upload processed", body = UploadResponse),
        (status = 400, description = "Missing session id or files", body = ErrorResponse)
    )
)]
pub async fn upload_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(malformed_multipart)?;
    let max_bytes = app_state.config.max_upload_bytes;
    let mut session_id: Option<String> = None;
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    // The session id may arrive after the files, so every part is read first.
    while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("session_id") => {
                session_id = Some(read_session_field(field).await?);
            }
            Some("files") | Some("file") if files.len() >= MAX_FILES_PER_UPLOAD => {
                let filename = field.file_name().unwrap_or("untitled.pdf").to_string();
                drain_field(field).await?;
                warnings.push(format!(
                    "Error processing {}: at most {} files can be uploaded at once",
                    filename, MAX_FILES_PER_UPLOAD
                ));
            }
            Some("files") | Some("file") => {
                files.push(read_file_field(field, max_bytes).await?);
            }
            _ => {}
        }
    }

    let session_id = session_id
        .ok_or_else(|| PortError::InvalidInput("Session ID required".to_string()))?;
    let session_id = parse_session_id(&session_id)?;
    if files.is_empty() {
        return Err(PortError::InvalidInput("No files were uploaded".to_string()).into());
    }

    app_state.sessions.touch_session(session_id).await?;

    let mut uploaded_pdfs = Vec::new();
    for file in files {
        let filename = file.filename.clone();
        match ingest_pdf(&app_state, session_id, file).await {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                uploaded_pdfs.push(UploadedPdf {
                    id: outcome.document.id,
                    filename: outcome.document.original_filename,
                    text_preview: outcome.text_preview,
                    chunks_created: outcome.document.chunk_count,
                    file_size: outcome.document.file_size,
                });
            }
            Err(e) => {
                warn!(%session_id, kind = e.kind(), "Skipping '{}': {}", filename, e);
                warnings.push(format!("Error processing {}: {}", filename, e));
            }
        }
    }

    Ok(Json(UploadResponse {
        success: true,
        total_uploaded: uploaded_pdfs.len(),
        uploaded_pdfs,
        warnings,
    }))
}

/// List the PDFs of a session in upload order.
#[utoipa::path(
    get,
    path = "/get_pdfs/{session_id}",
    params(("session_id" = String, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Documents of the session", body = PdfListResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn get_pdfs_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<PdfListResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    app_state.sessions.get_session(session_id).await?;
    let documents = app_state.sessions.list_documents(session_id).await?;
    Ok(Json(PdfListResponse {
        success: true,
        pdfs: documents.into_iter().map(PdfInfo::from).collect(),
    }))
}

/// Remove a PDF and all of its chunks from a session.
#[utoipa::path(
    delete,
    path = "/remove_pdf/{session_id}/{pdf_id}",
    params(
        ("session_id" = String, Path, description = "The session id."),
        ("pdf_id" = i64, Path, description = "The document id.")
    ),
    responses(
        (status = 200, description = "Document removed", body = SuccessResponse),
        (status = 404, description = "Document not found in this session", body = ErrorResponse)
    )
)]
pub async fn remove_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    Path((session_id, pdf_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    let pdf_id: i64 = pdf_id
        .parse()
        .map_err(|_| PortError::InvalidInput(format!("Invalid document id '{}'", pdf_id)))?;

    app_state.chunks.delete_document(session_id, pdf_id).await?;
    info!(%session_id, document_id = pdf_id, "Document removed");
    Ok(Json(SuccessResponse {
        success: true,
        message: "PDF removed successfully".to_string(),
    }))
}

//=========================================================================================
// Chat Handlers
//=========================================================================================

/// Ask a question about the session's documents.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The assistant reply", body = ChatResponse),
        (status = 400, description = "Empty message or malformed session id", body = ErrorResponse),
        (status = 502, description = "The language model failed", body = ErrorResponse),
        (status = 503, description = "The embedding service failed", body = ErrorResponse),
        (status = 504, description = "The language model timed out", body = ErrorResponse)
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|e| PortError::InvalidInput(format!("Invalid chat request: {}", e)))?;
    let session_id = parse_session_id(&request.session_id)?;

    let outcome = chat_turn(&app_state, session_id, &request.message).await?;
    Ok(Json(ChatResponse {
        success: true,
        reply: outcome.reply,
        response_time_ms: outcome.response_time_ms,
        context_used: outcome.context_used,
        sources_count: outcome.sources_count,
    }))
}

/// Return the conversation of a session in chronological order.
#[utoipa::path(
    get,
    path = "/get_chat_history/{session_id}",
    params(
        ("session_id" = String, Path, description = "The session id."),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "The conversation", body = HistoryResponse),
        (status = 400, description = "Malformed session id or limit", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn get_chat_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let Query(query) = query
        .map_err(|e| PortError::InvalidInput(format!("Invalid query parameters: {}", e)))?;
    let session_id = parse_session_id(&session_id)?;
    app_state.sessions.get_session(session_id).await?;
    let messages = app_state
        .conversations
        .history(session_id, query.limit)
        .await?;
    Ok(Json(HistoryResponse {
        success: true,
        total_messages: messages.len(),
        messages: messages.into_iter().map(HistoryMessage::from).collect(),
    }))
}

/// Clear a session's conversation and remove its documents.
#[utoipa::path(
    delete,
    path = "/clear_chat/{session_id}",
    params(("session_id" = String, Path, description = "The session id.")),
    responses(
        (status = 200, description = "Session cleared", body = SuccessResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn clear_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let session_id = parse_session_id(&session_id)?;
    app_state.sessions.get_session(session_id).await?;
    let cleared = app_state.sessions.clear_session(session_id).await?;
    info!(
        %session_id,
        messages = cleared.messages,
        documents = cleared.documents,
        "Session cleared"
    );
    Ok(Json(SuccessResponse {
        success: true,
        message: "Chat history cleared successfully".to_string(),
    }))
}

//=========================================================================================
// Operational Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "The service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
        }),
    )
}
