//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow for one uploaded document: raw bytes → extracted
//! text → chunks → embeddings → persisted chunk rows, with the document's
//! status tracking the outcome. Re-running the pipeline for a document
//! replaces its chunks wholesale, so ingestion is idempotent per
//! document id. The pipeline never retries; retry policy belongs to the
//! caller, which must also serialize re-ingestion per document.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::chunk_text;
use crate::config::ChunkingConfig;
use crate::error::{EngineError, Result};
use crate::extract::extract_text;
use crate::models::{ChunkRecord, DocumentStatus};
use crate::provider::ModelProvider;
use crate::store::{ChunkStore, DocumentStore};

/// Runs the extract → chunk → embed → persist flow for one document.
pub struct IngestionPipeline {
    provider: Arc<dyn ModelProvider>,
    chunks: Arc<dyn ChunkStore>,
    documents: Arc<dyn DocumentStore>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        chunks: Arc<dyn ChunkStore>,
        documents: Arc<dyn DocumentStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            provider,
            chunks,
            documents,
            chunking,
        }
    }

    /// Ingest one document's raw bytes.
    ///
    /// On success the document's status is `Ready`; on any failure it is
    /// `Error` and the failure propagates. Chunk persistence completes in
    /// full before the status flips to `Ready`, so a concurrent retrieval
    /// never observes a partially-ingested document labeled ready.
    pub async fn ingest(&self, document_id: &str, bytes: &[u8], mime_type: &str) -> Result<()> {
        self.documents
            .set_status(document_id, DocumentStatus::Processing)
            .await?;

        match self.run(document_id, bytes, mime_type).await {
            Ok(chunk_count) => {
                self.documents
                    .set_status(document_id, DocumentStatus::Ready)
                    .await?;
                info!(document_id, chunk_count, "document ingested");
                Ok(())
            }
            Err(e) => {
                // Record the failure but surface the original error
                if let Err(status_err) = self
                    .documents
                    .set_status(document_id, DocumentStatus::Error)
                    .await
                {
                    warn!(document_id, error = %status_err, "failed to record error status");
                }
                Err(e)
            }
        }
    }

    async fn run(&self, document_id: &str, bytes: &[u8], mime_type: &str) -> Result<usize> {
        let text = extract_text(bytes, mime_type)?;
        let windows = chunk_text(&text, self.chunking.chunk_size, self.chunking.overlap)?;

        // A document with no extractable text cannot be queried
        // meaningfully; mark it failed rather than silently succeeding.
        if windows.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "document {} produced no chunks",
                document_id
            )));
        }

        // One batched call for all chunks rather than one call per chunk
        let embeddings = self.provider.embed_batch(&windows).await?;
        if embeddings.len() != windows.len() {
            return Err(EngineError::InvalidResponse(format!(
                "embedding count mismatch: {} chunks, {} vectors",
                windows.len(),
                embeddings.len()
            )));
        }
        let dims = self.provider.dims();
        for embedding in &embeddings {
            if embedding.len() != dims {
                return Err(EngineError::InvalidResponse(format!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    dims,
                    embedding.len()
                )));
            }
        }

        let records: Vec<ChunkRecord> = windows
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                ordinal: i as i64,
                content,
                embedding,
            })
            .collect();

        // Wholesale atomic replacement: a failure here leaves the
        // document's previous chunk set intact, never a partial one.
        self.chunks.replace_all(document_id, &records).await?;

        Ok(records.len())
    }
}
