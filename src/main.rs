//! # docqa CLI
//!
//! The `docqa` binary drives the engine from the command line: database
//! initialization, document ingestion, retrieval inspection, and chat
//! turns.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa init` | Create the SQLite database and run schema migrations |
//! | `docqa ingest <path>` | Register a local file and run the ingestion pipeline |
//! | `docqa retrieve <doc-id> "<query>"` | Print the top-k ranked chunks for a query |
//! | `docqa ask "<question>"` | Run a chat turn, optionally grounded in a document |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! docqa init --config ./config/docqa.toml
//!
//! # Ingest a PDF
//! docqa ingest ./paper.pdf --title "Attention Is All You Need"
//!
//! # Inspect retrieval for a document
//! docqa retrieve 3f2a... "what optimizer was used" --k 3
//!
//! # Grounded question
//! docqa ask "what optimizer was used" --document 3f2a...
//!
//! # Ungrounded chat (continues a session)
//! docqa ask "summarize that differently" --session 9b1c...
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use docqa::chat::ChatService;
use docqa::config::{self, Config};
use docqa::extract::mime_from_extension;
use docqa::ingest::IngestionPipeline;
use docqa::models::{Document, DocumentStatus};
use docqa::provider::OpenAiProvider;
use docqa::retrieval::RetrievalEngine;
use docqa::store::sqlite::SqliteStore;
use docqa::store::DocumentStore;
use docqa::synthesize::AnswerSynthesizer;
use docqa::{db, migrate};

/// docqa CLI — a retrieval-augmented question answering engine for
/// uploaded documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — a retrieval-augmented question answering engine for uploaded documents",
    version,
    long_about = "docqa ingests PDF and plain-text documents, chunks and embeds them, and \
    answers natural-language questions grounded in the most similar chunks, with token-usage \
    accounting per answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, chat_sessions, chat_messages). Idempotent.
    Init,

    /// Register a local file as a document and run the ingestion pipeline.
    ///
    /// The MIME type is inferred from the file extension (`.pdf`, `.txt`,
    /// `.md`). On success the document is `ready` and retrievable; on
    /// failure it is left in the `error` state and can be re-ingested.
    Ingest {
        /// Path to the file to ingest.
        path: PathBuf,

        /// Document title. Defaults to the file name.
        #[arg(long)]
        title: Option<String>,
    },

    /// Print the top-k ranked chunks of a document for a query.
    Retrieve {
        /// Document UUID.
        document_id: String,

        /// The query string.
        query: String,

        /// Number of chunks to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Run a chat turn and print the answer, sources, and token usage.
    ///
    /// With `--document`, the answer is grounded in that document's
    /// chunks. With `--session`, the turn continues an existing
    /// conversation (and inherits its document scope).
    Ask {
        /// The question to ask.
        question: String,

        /// Ground the answer in this document.
        #[arg(long)]
        document: Option<String>,

        /// Continue an existing chat session.
        #[arg(long)]
        session: Option<String>,
    },
}

/// Owner recorded for documents and sessions created from the CLI.
const CLI_OWNER: &str = "cli";

struct Engine {
    store: Arc<SqliteStore>,
    pipeline: IngestionPipeline,
    chat: ChatService,
    retrieval: RetrievalEngine,
}

fn build_engine(cfg: &Config, pool: sqlx::SqlitePool) -> anyhow::Result<Engine> {
    let store = Arc::new(SqliteStore::new(pool, cfg.provider.dims));
    let provider = Arc::new(OpenAiProvider::new(cfg.provider.clone())?);

    let pipeline = IngestionPipeline::new(
        provider.clone(),
        store.clone(),
        store.clone(),
        cfg.chunking.clone(),
    );
    let retrieval = RetrievalEngine::new(provider.clone(), store.clone());
    let synthesizer = AnswerSynthesizer::new(
        provider.clone(),
        retrieval.clone(),
        cfg.retrieval.top_k,
        cfg.provider.temperature,
    );
    let chat = ChatService::new(store.clone(), synthesizer);

    Ok(Engine {
        store,
        pipeline,
        chat,
        retrieval,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let pool = db::connect(&cfg.db.path).await?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, title } => {
            let engine = build_engine(&cfg, pool.clone())?;

            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let mime_type = mime_from_extension(ext)
                .with_context(|| format!("unsupported file extension: {:?}", path))?;
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;

            let title = title.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string())
            });

            let doc = Document {
                id: Uuid::new_v4().to_string(),
                owner_id: CLI_OWNER.to_string(),
                title: title.clone(),
                status: DocumentStatus::Uploaded,
                created_at: Utc::now(),
            };
            engine.store.insert(&doc).await?;

            engine.pipeline.ingest(&doc.id, &bytes, mime_type).await?;
            let chunk_count =
                docqa::store::ChunkStore::count(engine.store.as_ref(), &doc.id).await?;

            println!("ingest {}", path.display());
            println!("  document: {}", doc.id);
            println!("  title: {}", title);
            println!("  chunks: {}", chunk_count);
            println!("ok");
        }
        Commands::Retrieve {
            document_id,
            query,
            k,
        } => {
            let engine = build_engine(&cfg, pool.clone())?;
            let k = k.unwrap_or(cfg.retrieval.top_k);
            let hits = engine.retrieval.retrieve(&document_id, &query, k).await?;

            if hits.is_empty() {
                println!("No results.");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    let excerpt: String = hit.content.chars().take(160).collect();
                    println!("{}. [{:.4}] chunk {} ({})", i + 1, hit.score, hit.ordinal, hit.chunk_id);
                    println!("    \"{}\"", excerpt.replace('\n', " "));
                }
            }
        }
        Commands::Ask {
            question,
            document,
            session,
        } => {
            let engine = build_engine(&cfg, pool.clone())?;
            let turn = engine
                .chat
                .send_message(
                    CLI_OWNER,
                    &question,
                    document.as_deref(),
                    session.as_deref(),
                )
                .await?;

            println!("{}", turn.answer.text);
            println!();
            if !turn.answer.sources.is_empty() {
                println!("sources:");
                for source in &turn.answer.sources {
                    println!("  [{:.4}] chunk {}", source.score, source.ordinal);
                }
            }
            println!("session: {}", turn.session_id);
            println!(
                "tokens: prompt={} completion={} total={}",
                turn.answer.usage.prompt_tokens,
                turn.answer.usage.completion_tokens,
                turn.answer.usage.total_tokens
            );
        }
    }

    pool.close().await;
    Ok(())
}
