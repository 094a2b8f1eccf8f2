//! Core data models used throughout docqa.
//!
//! These types represent the documents, chunks, chat sessions, and token
//! accounting that flow through the ingestion and answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded document.
///
/// Transitions are monotonic: `Uploaded → Processing → Ready` or
/// `Uploaded → Processing → Error`. A terminal state only changes when a
/// fresh ingestion run restarts the document at `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "ready" => Ok(DocumentStatus::Ready),
            "error" => Ok(DocumentStatus::Error),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded document awaiting or past ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// A stored chunk of a document's text, with its embedding vector.
///
/// Chunks are immutable once created and replaced wholesale when their
/// document is re-ingested. The ordinal records insertion order and is
/// used only for traceability and deterministic tie-breaking, never for
/// ranking.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    pub ordinal: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A retrieved chunk with its similarity score against a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: String,
    pub ordinal: i64,
    pub content: String,
    pub score: f64,
}

/// Role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {}", other)),
        }
    }
}

/// A conversation, optionally scoped to a single document.
///
/// Created lazily on the first message; the title is derived from that
/// message.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub owner_id: String,
    pub document_id: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One message within a chat session. Ordering is insertion order.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    /// Authoring user, `None` for assistant messages.
    pub author_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Token accounting for one completion call. A value, never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
