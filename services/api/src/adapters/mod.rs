pub mod chat_llm;
pub mod db;
pub mod embeddings;
pub mod pdf;

pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use embeddings::OpenAiEmbeddingAdapter;
pub use pdf::PdfExtractAdapter;
