//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use docchat_core::ports::{
    ChunkStore, ConversationStore, EmbeddingService, GenerationService, SessionStore,
    TextExtractor,
};
use docchat_core::{PromptAssembler, Retriever};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Holds no per-session data; every operation receives the session id explicitly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub chunks: Arc<dyn ChunkStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub embedder: Arc<dyn EmbeddingService>,
    pub generator: Arc<dyn GenerationService>,
    pub extractor: Arc<dyn TextExtractor>,
    pub retriever: Retriever,
    pub assembler: PromptAssembler,
}

impl AppState {
    /// Wires the state around a single store implementing every persistence port.
    pub fn new<S>(
        config: Arc<Config>,
        store: Arc<S>,
        embedder: Arc<dyn EmbeddingService>,
        generator: Arc<dyn GenerationService>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self
    where
        S: SessionStore + ChunkStore + ConversationStore + 'static,
    {
        let chunks: Arc<dyn ChunkStore> = store.clone();
        let retriever = Retriever::new(embedder.clone(), chunks.clone())
            .with_min_similarity(config.retrieval_min_similarity);
        let assembler = PromptAssembler::new(config.prompt);

        Self {
            sessions: store.clone(),
            conversations: store,
            chunks,
            embedder,
            generator,
            extractor,
            retriever,
            assembler,
            config,
        }
    }
}
