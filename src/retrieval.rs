//! Similarity retrieval over a document's stored chunks.
//!
//! Embeds the query through the model provider and asks the chunk store
//! for the top-k most similar rows. The ranking contract (descending
//! score, ordinal tie-break) lives with the store; this module owns the
//! query-side short circuits.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::ScoredChunk;
use crate::provider::ModelProvider;
use crate::store::ChunkStore;

/// Retrieves the most relevant chunks of one document for a query.
/// Cloning is cheap; clones share the provider and chunk store.
#[derive(Clone)]
pub struct RetrievalEngine {
    provider: Arc<dyn ModelProvider>,
    chunks: Arc<dyn ChunkStore>,
}

impl RetrievalEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, chunks: Arc<dyn ChunkStore>) -> Self {
        Self { provider, chunks }
    }

    /// Return up to `k` chunks of `document_id` ranked by similarity to
    /// `query`, best first.
    ///
    /// An empty or whitespace-only query yields an empty result without
    /// calling the provider, as does `k == 0`. A document with zero
    /// chunks yields an empty result, not an error.
    pub async fn retrieve(
        &self,
        document_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.provider.embed_one(query).await?;
        let hits = self.chunks.query_top_k(document_id, &query_vec, k).await?;
        debug!(document_id, k, hits = hits.len(), "retrieval complete");
        Ok(hits)
    }
}
