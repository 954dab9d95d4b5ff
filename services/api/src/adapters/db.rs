//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! persistence ports from the `core` crate (`SessionStore`, `ChunkStore` and
//! `ConversationStore`). It handles all interactions with SQLite using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docchat_core::domain::{
    ClearedSession, Document, Message, NewChunk, NewDocument, NewMessage, ScoredChunk, Session,
    SessionSummary, StoredChunk,
};
use docchat_core::ports::{ChunkStore, ConversationStore, PortError, PortResult, SessionStore};
use docchat_core::similarity::{bytes_to_embedding, embedding_to_bytes, rank_chunks};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens a pool for `database_url` with foreign keys enforced.
    ///
    /// An in-memory database lives inside a single connection, so the pool is
    /// pinned to one connection that is never recycled.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage_err(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

fn parse_session_id(raw: &str) -> PortResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| PortError::Storage(format!("corrupt session id '{raw}': {e}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    session_id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        Ok(Session {
            id: parse_session_id(&self.session_id)?,
            created_at: self.created_at,
            last_activity: self.last_activity,
        })
    }
}

#[derive(FromRow)]
struct SessionSummaryRecord {
    session_id: String,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    pdf_count: i64,
    message_count: i64,
}
impl SessionSummaryRecord {
    fn to_domain(self) -> PortResult<SessionSummary> {
        Ok(SessionSummary {
            session: Session {
                id: parse_session_id(&self.session_id)?,
                created_at: self.created_at,
                last_activity: self.last_activity,
            },
            pdf_count: self.pdf_count as u64,
            message_count: self.message_count as u64,
        })
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: i64,
    session_id: String,
    original_filename: String,
    file_size: i64,
    upload_time: DateTime<Utc>,
    chunk_count: i64,
}
impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        Ok(Document {
            id: self.id,
            session_id: parse_session_id(&self.session_id)?,
            original_filename: self.original_filename,
            file_size: self.file_size as u64,
            upload_time: self.upload_time,
            chunk_count: self.chunk_count as u64,
        })
    }
}

#[derive(FromRow)]
struct ChunkRecord {
    chunk_id: i64,
    document_id: i64,
    document_name: String,
    chunk_index: i64,
    chunk_text: String,
    embedding: Vec<u8>,
}
impl ChunkRecord {
    fn to_domain(self) -> StoredChunk {
        StoredChunk {
            chunk_id: self.chunk_id,
            document_id: self.document_id,
            document_name: self.document_name,
            chunk_index: self.chunk_index as usize,
            text: self.chunk_text,
            embedding: bytes_to_embedding(&self.embedding),
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    session_id: String,
    user_message: String,
    bot_response: String,
    timestamp: DateTime<Utc>,
    response_time_ms: i64,
    context_used: bool,
    sources_count: i64,
    relevant_pdfs: String,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        let relevant_document_ids = self
            .relevant_pdfs
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|e| PortError::Storage(format!("corrupt relevant_pdfs: {e}")))
            })
            .collect::<PortResult<Vec<_>>>()?;
        Ok(Message {
            id: self.id,
            session_id: parse_session_id(&self.session_id)?,
            user_message: self.user_message,
            bot_response: self.bot_response,
            timestamp: self.timestamp,
            response_time_ms: self.response_time_ms as u64,
            context_used: self.context_used,
            sources_count: self.sources_count as usize,
            relevant_document_ids,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "d.id, d.session_id, d.original_filename, d.file_size, d.upload_time, \
     (SELECT COUNT(*) FROM chunks c WHERE c.document_id = d.id) AS chunk_count";

const MESSAGE_COLUMNS: &str = "id, session_id, user_message, bot_response, timestamp, \
     response_time_ms, context_used, sources_count, relevant_pdfs";

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn create_session(&self) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO chat_sessions (session_id) VALUES (?) \
             RETURNING session_id, created_at, last_activity",
        )
        .bind(Uuid::new_v4().to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?
        .to_domain()
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT session_id, created_at, last_activity FROM chat_sessions WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?
        .to_domain()
    }

    async fn touch_session(&self, session_id: Uuid) -> PortResult<Session> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "INSERT INTO chat_sessions (session_id) VALUES (?) \
             ON CONFLICT (session_id) DO UPDATE SET last_activity = {NOW} \
             RETURNING session_id, created_at, last_activity"
        ))
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?
        .to_domain()
    }

    async fn session_summary(&self, session_id: Uuid) -> PortResult<SessionSummary> {
        sqlx::query_as::<_, SessionSummaryRecord>(
            "SELECT s.session_id, s.created_at, s.last_activity, \
             (SELECT COUNT(*) FROM documents d WHERE d.session_id = s.session_id) AS pdf_count, \
             (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.session_id) AS message_count \
             FROM chat_sessions s WHERE s.session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?
        .to_domain()
    }

    async fn list_documents(&self, session_id: Uuid) -> PortResult<Vec<Document>> {
        let records = sqlx::query_as::<_, DocumentRecord>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.session_id = ? ORDER BY d.id ASC"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn clear_session(&self, session_id: Uuid) -> PortResult<ClearedSession> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let messages = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?
            .rows_affected();
        let documents = sqlx::query("DELETE FROM documents WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?
            .rows_affected();

        tx.commit().await.map_err(storage_err)?;
        Ok(ClearedSession {
            messages,
            documents,
        })
    }
}

//=========================================================================================
// `ChunkStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChunkStore for DbAdapter {
    async fn store_document(
        &self,
        session_id: Uuid,
        document: NewDocument,
        chunks: Vec<NewChunk>,
    ) -> PortResult<Document> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        let (document_id, upload_time): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO documents (session_id, original_filename, file_size) VALUES (?, ?, ?) \
             RETURNING id, upload_time",
        )
        .bind(session_id.to_string())
        .bind(&document.original_filename)
        .bind(document.file_size as i64)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?;

        for chunk in &chunks {
            sqlx::query(
                "INSERT INTO chunks (document_id, chunk_index, chunk_text, chunk_size, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(document_id)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.text)
            .bind(chunk.text.chars().count() as i64)
            .bind(embedding_to_bytes(&chunk.embedding))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;

        Ok(Document {
            id: document_id,
            session_id,
            original_filename: document.original_filename,
            file_size: document.file_size,
            upload_time,
            chunk_count: chunks.len() as u64,
        })
    }

    async fn put(&self, session_id: Uuid, document_id: i64, chunk: NewChunk) -> PortResult<i64> {
        let owned: Option<i64> =
            sqlx::query_scalar("SELECT id FROM documents WHERE id = ? AND session_id = ?")
                .bind(document_id)
                .bind(session_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        if owned.is_none() {
            return Err(PortError::NotFound(format!(
                "Document {} not found in session {}",
                document_id, session_id
            )));
        }

        sqlx::query_scalar(
            "INSERT INTO chunks (document_id, chunk_index, chunk_text, chunk_size, embedding) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(document_id)
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.text)
        .bind(chunk.text.chars().count() as i64)
        .bind(embedding_to_bytes(&chunk.embedding))
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)
    }

    async fn query(
        &self,
        session_id: Uuid,
        vector: &[f32],
        k: usize,
    ) -> PortResult<Vec<ScoredChunk>> {
        // Linear scan over the session's chunks; the join is the tenancy boundary.
        let records = sqlx::query_as::<_, ChunkRecord>(
            "SELECT c.id AS chunk_id, c.document_id, d.original_filename AS document_name, \
             c.chunk_index, c.chunk_text, c.embedding \
             FROM chunks c JOIN documents d ON d.id = c.document_id \
             WHERE d.session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        let candidates = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(rank_chunks(vector, candidates, k))
    }

    async fn delete_document(&self, session_id: Uuid, document_id: i64) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND session_id = ?")
            .bind(document_id)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {} not found in session {}",
                document_id, session_id
            )));
        }
        Ok(())
    }

    async fn count_chunks(&self, session_id: Uuid) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks c JOIN documents d ON d.id = c.document_id \
             WHERE d.session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(count as u64)
    }
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for DbAdapter {
    async fn append(&self, message: NewMessage) -> PortResult<Message> {
        let relevant_pdfs = message
            .relevant_document_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO chat_messages \
             (session_id, user_message, bot_response, context_used, sources_count, relevant_pdfs, response_time_ms) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.session_id.to_string())
        .bind(&message.user_message)
        .bind(&message.bot_response)
        .bind(message.context_used)
        .bind(message.sources_count as i64)
        .bind(relevant_pdfs)
        .bind(message.response_time_ms as i64)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?
        .to_domain()
    }

    async fn history(&self, session_id: Uuid, limit: Option<usize>) -> PortResult<Vec<Message>> {
        let records = match limit {
            None => sqlx::query_as::<_, MessageRecord>(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = ? ORDER BY id ASC"
            ))
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await,
            Some(limit) => sqlx::query_as::<_, MessageRecord>(&format!(
                "SELECT * FROM (SELECT {MESSAGE_COLUMNS} FROM chat_messages \
                 WHERE session_id = ? ORDER BY id DESC LIMIT ?) ORDER BY id ASC"
            ))
            .bind(session_id.to_string())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(storage_err)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn clear(&self, session_id: Uuid) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}
