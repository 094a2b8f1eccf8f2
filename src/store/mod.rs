//! Storage abstraction for the engine.
//!
//! Three traits cover the engine's collaborator contracts: [`ChunkStore`]
//! for embedded chunk rows, [`DocumentStore`] for document lifecycle
//! status, and [`SessionStore`] for chat sessions and messages.
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! Ranking semantics are part of the [`ChunkStore::query_top_k`] contract:
//! descending similarity score, ties broken by ascending chunk ordinal,
//! at most `k` rows. [`rank_top_k`] implements that ordering and is shared
//! by both backends.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChatMessage, ChatSession, ChunkRecord, Document, DocumentStatus, ScoredChunk};

/// Store for embedded chunk rows, scoped by document.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Insert all chunk rows for a document atomically: either every row
    /// is written or none are.
    ///
    /// Rejects with `InvalidArgument` any chunk whose embedding length
    /// differs from the store's configured dimensionality.
    async fn insert_many(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()>;

    /// Rank the document's chunks by similarity to `query_vec`, returning
    /// at most `k` rows in descending score order (ordinal breaks ties).
    ///
    /// A document with no chunks yields an empty result, not an error.
    async fn query_top_k(
        &self,
        document_id: &str,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Replace every chunk row for a document with `chunks`, atomically:
    /// the delete and the insert commit together or not at all, so a
    /// failure leaves the previous chunk set intact.
    ///
    /// Same dimensionality validation as [`ChunkStore::insert_many`].
    async fn replace_all(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()>;

    /// Delete every chunk row for a document.
    async fn delete_all(&self, document_id: &str) -> Result<()>;

    /// Number of chunk rows stored for a document.
    async fn count(&self, document_id: &str) -> Result<u64>;
}

/// Store for document records and their lifecycle status.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, doc: &Document) -> Result<()>;

    async fn set_status(&self, document_id: &str, status: DocumentStatus) -> Result<()>;

    async fn get(&self, document_id: &str) -> Result<Option<Document>>;
}

/// Store for chat sessions and their messages.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &ChatSession) -> Result<()>;

    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>>;

    async fn append_message(&self, message: &ChatMessage) -> Result<()>;

    /// Messages for a session in insertion order.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

/// Sort scored chunks into the contract order and truncate to `k`.
///
/// Descending score; equal scores resolve by ascending ordinal so earlier
/// chunks win deterministically. `k == 0` yields an empty result.
pub fn rank_top_k(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.ordinal.cmp(&b.ordinal))
    });
    candidates.truncate(k);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(chunk_id: &str, ordinal: i64, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk_id: chunk_id.to_string(),
            ordinal,
            content: String::new(),
            score,
        }
    }

    #[test]
    fn test_rank_descending_by_score() {
        let ranked = rank_top_k(
            vec![scored("a", 0, 0.1), scored("b", 1, 0.9), scored("c", 2, 0.5)],
            3,
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_ties_resolve_by_ordinal_ascending() {
        let ranked = rank_top_k(
            vec![scored("late", 5, 0.7), scored("early", 1, 0.7)],
            2,
        );
        assert_eq!(ranked[0].chunk_id, "early");
        assert_eq!(ranked[1].chunk_id, "late");
    }

    #[test]
    fn test_truncates_to_k() {
        let ranked = rank_top_k(
            vec![scored("a", 0, 0.3), scored("b", 1, 0.2), scored("c", 2, 0.1)],
            2,
        );
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_k_zero_is_empty() {
        let ranked = rank_top_k(vec![scored("a", 0, 0.3)], 0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_k_beyond_available_returns_all() {
        let ranked = rank_top_k(vec![scored("a", 0, 0.3)], 10);
        assert_eq!(ranked.len(), 1);
    }
}
