//! Engine integration tests over the in-memory store and a deterministic
//! fake model provider.
//!
//! The fake provider embeds text as keyword counts along fixed axes, so
//! similarity rankings are exact and repeatable without a network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use docqa::chat::ChatService;
use docqa::config::ChunkingConfig;
use docqa::error::{EngineError, Result};
use docqa::ingest::IngestionPipeline;
use docqa::models::{Document, DocumentStatus, Usage};
use docqa::provider::{Completion, Message, ModelProvider};
use docqa::retrieval::RetrievalEngine;
use docqa::store::memory::MemoryStore;
use docqa::store::{ChunkStore, DocumentStore};
use docqa::synthesize::AnswerSynthesizer;

const DIMS: usize = 4;

/// Keyword-count embeddings: axes for "alpha", "beta", "gamma", and
/// everything else. Completions return a canned answer and fixed usage.
struct FakeProvider {
    embed_calls: AtomicUsize,
    complete_calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    /// When set, embeddings come back with the wrong dimensionality.
    wrong_dims: AtomicBool,
}

impl FakeProvider {
    fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            wrong_dims: AtomicBool::new(false),
        }
    }

    fn embed_text(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for token in text.split_whitespace() {
            match token {
                "alpha" => v[0] += 1.0,
                "beta" => v[1] += 1.0,
                "gamma" => v[2] += 1.0,
                _ => v[3] += 1.0,
            }
        }
        v
    }
}

#[async_trait]
impl ModelProvider for FakeProvider {
    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.wrong_dims.load(Ordering::SeqCst) {
            return Ok(texts.iter().map(|_| vec![0.0; DIMS + 1]).collect());
        }
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<Completion> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .ok_or_else(|| EngineError::InvalidArgument("empty message list".into()))?;
        *self.last_prompt.lock().unwrap() = Some(prompt);
        Ok(Completion {
            text: "A synthesized answer.".to_string(),
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        })
    }
}

struct Harness {
    provider: Arc<FakeProvider>,
    store: Arc<MemoryStore>,
    pipeline: IngestionPipeline,
    retrieval: RetrievalEngine,
    chat: ChatService,
}

fn harness() -> Harness {
    let provider = Arc::new(FakeProvider::new());
    let store = Arc::new(MemoryStore::new(DIMS));

    let pipeline = IngestionPipeline::new(
        provider.clone(),
        store.clone(),
        store.clone(),
        ChunkingConfig {
            chunk_size: 500,
            overlap: 50,
        },
    );
    let retrieval = RetrievalEngine::new(provider.clone(), store.clone());
    let synthesizer = AnswerSynthesizer::new(provider.clone(), retrieval.clone(), 5, 0.2);
    let chat = ChatService::new(store.clone(), synthesizer);

    Harness {
        provider,
        store,
        pipeline,
        retrieval,
        chat,
    }
}

async fn insert_doc(store: &MemoryStore, id: &str) {
    store
        .insert(&Document {
            id: id.to_string(),
            owner_id: "u1".to_string(),
            title: format!("doc {}", id),
            status: DocumentStatus::Uploaded,
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// 1200 filler tokens with "gamma" at token positions 1000..1050, so the
/// keyword appears only in the third window (tokens 900..1199).
fn body_with_answer_in_third_chunk() -> String {
    (0..1200)
        .map(|i| if (1000..1050).contains(&i) { "gamma" } else { "filler" })
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::test]
async fn test_end_to_end_grounded_answer() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let body = body_with_answer_in_third_chunk();
    h.pipeline
        .ingest("d1", body.as_bytes(), "text/plain")
        .await
        .unwrap();

    // 1200 tokens, size 500, overlap 50 => windows at 0, 450, 900
    assert_eq!(h.store.count("d1").await.unwrap(), 3);
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);

    // The question's keyword lives only in the third chunk
    let hits = h.retrieval.retrieve("d1", "what is gamma", 5).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].ordinal, 2);
    assert!(hits[0].score > hits[1].score);
    // The two keyword-free chunks tie; earlier ordinal wins
    assert_eq!(hits[1].ordinal, 0);
    assert_eq!(hits[2].ordinal, 1);

    let turn = h
        .chat
        .send_message("u1", "what is gamma", Some("d1"), None)
        .await
        .unwrap();
    assert_eq!(turn.answer.text, "A synthesized answer.");
    assert!(!turn.answer.sources.is_empty());
    assert_eq!(turn.answer.sources[0].ordinal, 2);
    assert_eq!(turn.answer.usage.total_tokens, 15);

    // The prompt carries the passages in relevance order plus the question
    let prompt = h.provider.last_prompt.lock().unwrap().clone().unwrap();
    assert!(prompt.contains("Context 1:"));
    assert!(prompt.contains("gamma"));
    assert!(prompt.ends_with("Question: what is gamma\nAnswer concisely:"));
}

#[tokio::test]
async fn test_reingestion_replaces_chunks_wholesale() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let body = body_with_answer_in_third_chunk();
    h.pipeline
        .ingest("d1", body.as_bytes(), "text/plain")
        .await
        .unwrap();
    h.pipeline
        .ingest("d1", b"alpha beta gamma", "text/plain")
        .await
        .unwrap();

    assert_eq!(h.store.count("d1").await.unwrap(), 1);
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
}

#[tokio::test]
async fn test_unsupported_media_type_marks_error() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let err = h
        .pipeline
        .ingest("d1", b"\x89PNG", "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedMediaType(_)));

    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);
    assert_eq!(h.store.count("d1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_document_marks_error() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let err = h
        .pipeline
        .ingest("d1", b"   \n \t ", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));

    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);
}

#[tokio::test]
async fn test_persistence_failure_leaves_zero_rows_and_error_status() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let body = body_with_answer_in_third_chunk();
    h.store.fail_next_insert();
    let err = h
        .pipeline
        .ingest("d1", body.as_bytes(), "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    // No partial commit: the document has zero chunk rows
    assert_eq!(h.store.count("d1").await.unwrap(), 0);
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);

    // A fresh run recovers
    h.pipeline
        .ingest("d1", body.as_bytes(), "text/plain")
        .await
        .unwrap();
    assert_eq!(h.store.count("d1").await.unwrap(), 3);
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
}

#[tokio::test]
async fn test_failed_reingestion_preserves_previous_corpus() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let body = body_with_answer_in_third_chunk();
    h.pipeline
        .ingest("d1", body.as_bytes(), "text/plain")
        .await
        .unwrap();
    assert_eq!(h.store.count("d1").await.unwrap(), 3);

    h.store.fail_next_insert();
    let err = h
        .pipeline
        .ingest("d1", b"alpha beta", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Storage(_)));

    // The previously-ready chunk set survives the failed replacement
    assert_eq!(h.store.count("d1").await.unwrap(), 3);
    let hits = h.retrieval.retrieve("d1", "what is gamma", 5).await.unwrap();
    assert_eq!(hits[0].ordinal, 2);

    // The failure is still visible in the document status until a
    // successful re-ingestion
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Error);

    h.pipeline
        .ingest("d1", b"alpha beta", "text/plain")
        .await
        .unwrap();
    assert_eq!(h.store.count("d1").await.unwrap(), 1);
    let doc = h.store.get("d1").await.unwrap().unwrap();
    assert_eq!(doc.status, DocumentStatus::Ready);
}

#[tokio::test]
async fn test_wrong_dimensionality_from_provider_is_invalid_response() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    h.provider.wrong_dims.store(true, Ordering::SeqCst);
    let err = h
        .pipeline
        .ingest("d1", b"alpha beta", "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidResponse(_)));
    assert_eq!(h.store.count("d1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_query_short_circuits() {
    let h = harness();
    insert_doc(&h.store, "d1").await;
    h.pipeline
        .ingest("d1", b"alpha beta gamma", "text/plain")
        .await
        .unwrap();

    let before = h.provider.embed_calls.load(Ordering::SeqCst);
    assert!(h.retrieval.retrieve("d1", "", 5).await.unwrap().is_empty());
    assert!(h.retrieval.retrieve("d1", "  \t ", 5).await.unwrap().is_empty());
    assert!(h.retrieval.retrieve("d1", "alpha", 0).await.unwrap().is_empty());
    // Neither the empty queries nor k=0 reached the provider
    assert_eq!(h.provider.embed_calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_retrieval_against_chunkless_document_is_empty() {
    let h = harness();
    insert_doc(&h.store, "d1").await;

    let hits = h.retrieval.retrieve("d1", "alpha", 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_k_larger_than_corpus_returns_all() {
    let h = harness();
    insert_doc(&h.store, "d1").await;
    h.pipeline
        .ingest("d1", b"alpha beta gamma", "text/plain")
        .await
        .unwrap();

    let hits = h.retrieval.retrieve("d1", "alpha", 50).await.unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_ungrounded_chat_skips_retrieval() {
    let h = harness();

    let before = h.provider.embed_calls.load(Ordering::SeqCst);
    let turn = h.chat.send_message("u1", "hello", None, None).await.unwrap();

    assert_eq!(h.provider.embed_calls.load(Ordering::SeqCst), before);
    assert!(turn.answer.sources.is_empty());
    assert_eq!(turn.answer.text, "A synthesized answer.");
}

#[tokio::test]
async fn test_session_created_lazily_and_scope_inherited() {
    let h = harness();
    insert_doc(&h.store, "d1").await;
    h.pipeline
        .ingest("d1", b"alpha beta gamma", "text/plain")
        .await
        .unwrap();

    let first = h
        .chat
        .send_message("u1", "tell me about alpha", Some("d1"), None)
        .await
        .unwrap();
    assert!(!first.answer.sources.is_empty());

    use docqa::store::SessionStore;
    let session = h
        .store
        .get_session(&first.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.document_id.as_deref(), Some("d1"));
    assert_eq!(session.title, "tell me about alpha...");

    // A follow-up without an explicit document inherits the session scope
    let second = h
        .chat
        .send_message("u1", "and beta", None, Some(&first.session_id))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert!(!second.answer.sources.is_empty());

    // Turn recording: two user + two assistant messages in order
    let messages = h.store.list_messages(&first.session_id).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].content, "tell me about alpha");
    assert!(messages[1].author_id.is_none());
    assert_eq!(messages[2].content, "and beta");
    assert!(messages[3].author_id.is_none());
}

#[tokio::test]
async fn test_empty_message_rejected_before_any_call() {
    let h = harness();
    let err = h.chat.send_message("u1", "  ", None, None).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert_eq!(h.provider.complete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_session_rejected() {
    let h = harness();
    let err = h
        .chat
        .send_message("u1", "hello", None, Some("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}
