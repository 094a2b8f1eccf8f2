//! Overlapping fixed-size window chunker.
//!
//! Splits normalized text on whitespace into tokens and emits windows of
//! up to `chunk_size` tokens, advancing the window start by
//! `chunk_size - overlap` each step. The overlap preserves semantic
//! continuity across window boundaries so retrieval can match content
//! that straddles a cut.
//!
//! The function is pure and deterministic: the same input always yields
//! the same chunk sequence, which makes re-ingestion idempotent.

use crate::error::{EngineError, Result};

/// Default window size in whitespace tokens.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive windows.
pub const DEFAULT_OVERLAP: usize = 50;

/// Split `text` into overlapping windows of whitespace tokens.
///
/// Windows are joined with single spaces; windows whose trimmed content
/// is empty are dropped. Token order is preserved.
///
/// # Errors
///
/// `InvalidArgument` when `chunk_size == 0` or `overlap >= chunk_size`
/// (the window would never advance).
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    if chunk_size == 0 {
        return Err(EngineError::InvalidArgument(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(EngineError::InvalidArgument(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < tokens.len() {
        let end = (start + chunk_size).min(tokens.len());
        let window = tokens[start..end].join(" ");
        if !window.trim().is_empty() {
            chunks.push(window);
        }
        start += step;
    }

    Ok(chunks)
}

/// [`chunk_text`] with the default windowing parameters.
pub fn chunk_text_default(text: &str) -> Result<Vec<String>> {
    chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP)
}
