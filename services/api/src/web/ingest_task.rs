//! services/api/src/web/ingest_task.rs
//!
//! This module contains the worker that turns one uploaded file into a stored,
//! searchable document: validation, text extraction, chunking and embedding.

use crate::web::state::AppState;
use bytes::Bytes;
use docchat_core::{
    chunk_text,
    domain::{Document, NewChunk, NewDocument},
    ports::{PortError, PortResult},
};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// File parts accepted per upload request; further parts are skipped with a warning.
pub const MAX_FILES_PER_UPLOAD: usize = 10;

/// Characters of extracted text shown back to the client after an upload.
pub const PREVIEW_CHARS: usize = 500;

/// Below this many extracted characters a document is flagged as low-yield.
const LOW_YIELD_CHARS: usize = 100;

/// A file part read from an upload request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
    /// Size in bytes as received, even when the content was discarded.
    pub size: usize,
    /// Set when the file exceeded the upload cap and its content was not kept.
    pub oversized: bool,
}

/// The result of successfully ingesting one file.
#[derive(Debug)]
pub struct IngestOutcome {
    pub document: Document,
    pub text_preview: String,
    /// Non-fatal problems, e.g. pages without a text layer.
    pub warnings: Vec<String>,
}

/// Whether the file claims to be a PDF by name or content type.
fn is_pdf(file: &UploadedFile) -> bool {
    let by_name = file.filename.to_ascii_lowercase().ends_with(".pdf");
    let by_type = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.eq_ignore_ascii_case("application/pdf"));
    by_name || by_type
}

/// Checks the file before any work is spent on it.
pub fn validate_upload(file: &UploadedFile, max_upload_bytes: usize) -> PortResult<()> {
    if !is_pdf(file) {
        return Err(PortError::InvalidInput(
            "only PDF files are accepted".to_string(),
        ));
    }
    if file.oversized || file.size > max_upload_bytes {
        return Err(PortError::InvalidInput(format!(
            "file exceeds the upload limit of {} bytes",
            max_upload_bytes
        )));
    }
    if file.bytes.is_empty() {
        return Err(PortError::InvalidInput("file is empty".to_string()));
    }
    Ok(())
}

/// The first `PREVIEW_CHARS` characters of `text`, with an ellipsis when cut.
pub fn text_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Validates, extracts, chunks, embeds and stores a single uploaded file.
///
/// The document and its chunks are persisted in one transaction, so a failure at
/// any step leaves nothing behind for this file.
pub async fn ingest_pdf(
    app_state: &AppState,
    session_id: Uuid,
    file: UploadedFile,
) -> PortResult<IngestOutcome> {
    let start_time = Instant::now();
    validate_upload(&file, app_state.config.max_upload_bytes)?;

    // Extraction is CPU-bound; keep it off the async executor.
    let extractor = app_state.extractor.clone();
    let bytes = file.bytes.clone();
    let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .map_err(|e| PortError::UnreadablePdf(format!("extraction task failed: {}", e)))??;

    let mut warnings = Vec::new();
    if extracted.empty_pages > 0 {
        warnings.push(format!(
            "{}: {} of {} pages had no extractable text",
            file.filename, extracted.empty_pages, extracted.page_count
        ));
    }
    let char_count = extracted.text.chars().count();
    if char_count < LOW_YIELD_CHARS {
        warnings.push(format!(
            "{}: only {} characters of text could be extracted",
            file.filename, char_count
        ));
    }

    let texts = chunk_text(&extracted.text, &app_state.config.chunking)?;
    let embeddings = app_state.embedder.embed(&texts).await?;
    if embeddings.len() != texts.len() {
        return Err(PortError::EmbeddingUnavailable(format!(
            "expected {} embeddings, received {}",
            texts.len(),
            embeddings.len()
        )));
    }

    let chunks: Vec<NewChunk> = texts
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(chunk_index, (text, embedding))| NewChunk {
            chunk_index,
            text,
            embedding,
        })
        .collect();

    let document = app_state
        .chunks
        .store_document(
            session_id,
            NewDocument {
                original_filename: file.filename.clone(),
                file_size: file.size as u64,
            },
            chunks,
        )
        .await?;

    for warning in &warnings {
        warn!(%session_id, "{}", warning);
    }
    info!(
        %session_id,
        document_id = document.id,
        chunks = document.chunk_count,
        pages = extracted.page_count,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Ingested '{}'",
        file.filename
    );

    Ok(IngestOutcome {
        text_preview: text_preview(&extracted.text),
        document,
        warnings,
    })
}
