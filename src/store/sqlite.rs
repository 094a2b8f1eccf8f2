//! SQLite store implementation backed by sqlx.
//!
//! Chunk embeddings live in a BLOB column as little-endian f32 bytes;
//! similarity is computed in Rust over the document's rows. Chunk
//! insertion for a document happens inside a single transaction so a
//! partial failure never leaves a subset of rows behind.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::{EngineError, Result};
use crate::models::{
    ChatMessage, ChatRole, ChatSession, ChunkRecord, Document, DocumentStatus, ScoredChunk,
};
use crate::similarity::{blob_to_vec, cosine_similarity, vec_to_blob};

use super::{rank_top_k, ChunkStore, DocumentStore, SessionStore};

/// Store implementation over a sqlx SQLite pool.
pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }
}

fn ts_to_datetime(ts: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(ts, 0).unwrap_or(chrono::DateTime::UNIX_EPOCH)
}

fn parse_status(s: &str) -> Result<DocumentStatus> {
    s.parse::<DocumentStatus>().map_err(EngineError::Storage)
}

fn parse_role(s: &str) -> Result<ChatRole> {
    s.parse::<ChatRole>().map_err(EngineError::Storage)
}

impl SqliteStore {
    fn check_dims(&self, chunks: &[ChunkRecord]) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dims {
                return Err(EngineError::InvalidArgument(format!(
                    "chunk {} embedding has {} dimensions, store expects {}",
                    chunk.id,
                    chunk.embedding.len(),
                    self.dims
                )));
            }
        }
        Ok(())
    }
}

async fn insert_chunks(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    document_id: &str,
    chunks: &[ChunkRecord],
) -> Result<()> {
    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, document_id, ordinal, content, embedding) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(document_id)
        .bind(chunk.ordinal)
        .bind(&chunk.content)
        .bind(vec_to_blob(&chunk.embedding))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn insert_many(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        self.check_dims(chunks)?;

        let mut tx = self.pool.begin().await?;
        insert_chunks(&mut tx, document_id, chunks).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn replace_all(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        self.check_dims(chunks)?;

        // Delete and insert commit together; a failed insert rolls the
        // delete back so the previous chunk set survives.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
        insert_chunks(&mut tx, document_id, chunks).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query_top_k(
        &self,
        document_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, ordinal, content, embedding FROM chunks WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    chunk_id: row.get("id"),
                    ordinal: row.get("ordinal"),
                    content: row.get("content"),
                    score: cosine_similarity(query_vec, &vec),
                }
            })
            .collect();

        Ok(rank_top_k(candidates, k))
    }

    async fn delete_all(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, document_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (id, owner_id, title, status, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.title)
        .bind(doc.status.as_str())
        .bind(doc.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_status(&self, document_id: &str, status: DocumentStatus) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EngineError::Storage(format!(
                "document not found: {}",
                document_id
            )));
        }
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, status, created_at FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let status: String = row.get("status");
                Ok(Some(Document {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    title: row.get("title"),
                    status: parse_status(&status)?,
                    created_at: ts_to_datetime(row.get("created_at")),
                }))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, session: &ChatSession) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, owner_id, document_id, title, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.owner_id)
        .bind(&session.document_id)
        .bind(&session.title)
        .bind(session.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let row = sqlx::query(
            "SELECT id, owner_id, document_id, title, created_at \
             FROM chat_sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ChatSession {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            document_id: row.get("document_id"),
            title: row.get("title"),
            created_at: ts_to_datetime(row.get("created_at")),
        }))
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (id, session_id, role, content, author_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&message.author_id)
        .bind(message.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, author_id, created_at \
             FROM chat_messages WHERE session_id = ? ORDER BY rowid",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                Ok(ChatMessage {
                    id: row.get("id"),
                    session_id: row.get("session_id"),
                    role: parse_role(&role)?,
                    content: row.get("content"),
                    author_id: row.get("author_id"),
                    created_at: ts_to_datetime(row.get("created_at")),
                })
            })
            .collect()
    }
}
