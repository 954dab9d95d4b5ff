//! services/api/src/web/chat_task.rs
//!
//! This module contains the worker function responsible for handling a single
//! question-and-answer turn against a session's documents.

use crate::web::state::AppState;
use docchat_core::{
    domain::{Message, NewMessage},
    ports::{PortError, PortResult},
};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// The outcome of one chat turn, already persisted to the conversation store.
#[derive(Debug)]
pub struct ChatOutcome {
    pub reply: String,
    pub response_time_ms: u64,
    pub context_used: bool,
    pub sources_count: usize,
    pub message: Message,
}

/// Answers `user_message` within `session_id`.
///
/// Retrieves context, assembles the prompt under the configured budget and asks the
/// language model for a reply. The exchange is appended only once a reply exists,
/// so a failed or timed-out turn leaves the history untouched.
pub async fn chat_turn(
    app_state: &AppState,
    session_id: Uuid,
    user_message: &str,
) -> PortResult<ChatOutcome> {
    let start_time = Instant::now();
    let question = user_message.trim();
    if question.is_empty() {
        return Err(PortError::InvalidInput(
            "Message cannot be empty".to_string(),
        ));
    }

    let config = &app_state.config;
    app_state.sessions.touch_session(session_id).await?;

    let history = app_state
        .conversations
        .history(session_id, Some(config.prompt.history_turns))
        .await?;
    let retrieved = app_state
        .retriever
        .retrieve(session_id, question, config.retrieval_top_k)
        .await?;
    let assembled = app_state.assembler.assemble(question, &retrieved, &history);
    debug!(
        %session_id,
        retrieved = retrieved.len(),
        chunks_in_prompt = assembled.chunks.len(),
        history_turns = assembled.history_turns,
        prompt_chars = assembled.prompt.char_len(),
        "Prompt assembled"
    );

    let reply = tokio::time::timeout(
        config.llm_timeout,
        app_state.generator.generate(&assembled.prompt),
    )
    .await
    .map_err(|_| PortError::LlmTimeout(config.llm_timeout.as_secs()))??;

    let response_time_ms = start_time.elapsed().as_millis() as u64;
    let relevant_document_ids = assembled.source_document_ids();
    let context_used = assembled.context_used();
    let sources_count = relevant_document_ids.len();

    let message = app_state
        .conversations
        .append(NewMessage {
            session_id,
            user_message: question.to_string(),
            bot_response: reply.clone(),
            response_time_ms,
            context_used,
            sources_count,
            relevant_document_ids,
        })
        .await?;

    info!(
        %session_id,
        response_time_ms,
        context_used,
        sources_count,
        "Chat turn answered"
    );

    Ok(ChatOutcome {
        reply,
        response_time_ms,
        context_used,
        sources_count,
        message,
    })
}
