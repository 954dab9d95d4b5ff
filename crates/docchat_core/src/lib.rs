pub mod chunker;
pub mod domain;
pub mod ports;
pub mod prompt;
pub mod retriever;
pub mod similarity;

pub use chunker::{chunk_text, ChunkConfig};
pub use domain::{
    ClearedSession, Document, ExtractedText, Message, NewChunk, NewDocument, NewMessage,
    ScoredChunk, Session, SessionSummary, StoredChunk,
};
pub use ports::{
    ChunkStore, ConversationStore, EmbeddingService, GenerationService, PortError, PortResult,
    SessionStore, TextExtractor,
};
pub use prompt::{AssembledPrompt, Prompt, PromptAssembler, PromptConfig};
pub use retriever::Retriever;
