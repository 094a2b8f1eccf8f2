//! # docqa
//!
//! A retrieval-augmented question answering engine for uploaded
//! documents. Documents are extracted, chunked into overlapping windows,
//! embedded, and stored; questions are answered by a chat model grounded
//! in the top-k most similar chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌───────────┐
//! │ Uploads  │──▶│ Ingestion        │──▶│  SQLite   │
//! │ PDF/text │   │ chunk + embed    │   │ vectors   │
//! └──────────┘   └──────────────────┘   └─────┬─────┘
//!                                             │
//!                ┌──────────────────┐         │
//!   question ──▶ │ Retrieve → Prompt│◀────────┘
//!                │ → Complete       │──▶ answer + sources + usage
//!                └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunker`] | Overlapping window chunking |
//! | [`extract`] | PDF / plain-text extraction |
//! | [`provider`] | Model provider trait and OpenAI backend |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieval`] | Top-k similarity retrieval |
//! | [`similarity`] | Cosine similarity and vector BLOB codecs |
//! | [`prompt`] | Context-prompt assembly |
//! | [`synthesize`] | Grounded/ungrounded answer synthesis |
//! | [`chat`] | Chat sessions and turn recording |
//! | [`store`] | Storage traits, in-memory and SQLite backends |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod similarity;
pub mod store;
pub mod synthesize;

pub use error::{EngineError, Result};
