//! In-memory store implementation for tests and embedding-free dev runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Similarity search is brute-force cosine over the document's vectors.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{EngineError, Result};
use crate::models::{ChatMessage, ChatSession, ChunkRecord, Document, DocumentStatus, ScoredChunk};
use crate::similarity::cosine_similarity;

use super::{rank_top_k, ChunkStore, DocumentStore, SessionStore};

/// In-memory store implementing all three store traits.
pub struct MemoryStore {
    dims: usize,
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<ChunkRecord>>,
    sessions: RwLock<HashMap<String, ChatSession>>,
    messages: RwLock<Vec<ChatMessage>>,
    /// When set, the next `insert_many` fails. Lets tests exercise the
    /// atomic-ingestion guarantee.
    fail_next_insert: RwLock<bool>,
}

impl MemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            sessions: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            fail_next_insert: RwLock::new(false),
        }
    }

    /// Arrange for the next `insert_many` or `replace_all` call to fail
    /// with a storage error, leaving the stored rows untouched.
    pub fn fail_next_insert(&self) {
        *self.fail_next_insert.write().unwrap() = true;
    }

    fn take_injected_failure(&self) -> Result<()> {
        if std::mem::take(&mut *self.fail_next_insert.write().unwrap()) {
            return Err(EngineError::Storage("injected insert failure".into()));
        }
        Ok(())
    }

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

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn insert_many(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        self.take_injected_failure()?;
        self.check_dims(chunks)?;

        let mut stored = self.chunks.write().unwrap();
        for chunk in chunks {
            debug_assert_eq!(chunk.document_id, document_id);
            stored.push(chunk.clone());
        }
        Ok(())
    }

    async fn replace_all(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        // Fail before touching stored rows so the previous chunk set
        // survives, matching the SQLite store's rollback behavior.
        self.take_injected_failure()?;
        self.check_dims(chunks)?;

        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.document_id != document_id);
        for chunk in chunks {
            debug_assert_eq!(chunk.document_id, document_id);
            stored.push(chunk.clone());
        }
        Ok(())
    }

    async fn query_top_k(
        &self,
        document_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let stored = self.chunks.read().unwrap();
        let candidates: Vec<ScoredChunk> = stored
            .iter()
            .filter(|c| c.document_id == document_id)
            .map(|c| ScoredChunk {
                chunk_id: c.id.clone(),
                ordinal: c.ordinal,
                content: c.content.clone(),
                score: cosine_similarity(query_vec, &c.embedding),
            })
            .collect();
        Ok(rank_top_k(candidates, k))
    }

    async fn delete_all(&self, document_id: &str) -> Result<()> {
        self.chunks
            .write()
            .unwrap()
            .retain(|c| c.document_id != document_id);
        Ok(())
    }

    async fn count(&self, document_id: &str) -> Result<u64> {
        let stored = self.chunks.read().unwrap();
        Ok(stored.iter().filter(|c| c.document_id == document_id).count() as u64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, doc: &Document) -> Result<()> {
        self.docs
            .write()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn set_status(&self, document_id: &str, status: DocumentStatus) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(document_id) {
            Some(doc) => {
                doc.status = status;
                Ok(())
            }
            None => Err(EngineError::Storage(format!(
                "document not found: {}",
                document_id
            ))),
        }
    }

    async fn get(&self, document_id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().unwrap().get(document_id).cloned())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.read().unwrap().get(id).cloned())
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<()> {
        self.messages.write().unwrap().push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let messages = self.messages.read().unwrap();
        Ok(messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect())
    }
}
