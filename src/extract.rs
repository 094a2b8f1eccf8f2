//! Text extraction for uploaded documents.
//!
//! The upload collaborator supplies raw bytes plus a MIME type; this
//! module returns plain UTF-8 text for the chunker. PDF extraction uses
//! `pdf-extract`; `text/*` is decoded as UTF-8.

use crate::error::{EngineError, Result};

/// MIME type of PDF uploads.
pub const MIME_PDF: &str = "application/pdf";

/// Extract plain text from document bytes.
///
/// # Errors
///
/// `UnsupportedMediaType` for anything other than `application/pdf` or
/// `text/*`; `InvalidArgument` when a PDF cannot be parsed.
pub fn extract_text(bytes: &[u8], mime_type: &str) -> Result<String> {
    if mime_type == MIME_PDF {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| EngineError::InvalidArgument(format!("PDF extraction failed: {}", e)))
    } else if mime_type.starts_with("text/") {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    } else {
        Err(EngineError::UnsupportedMediaType(mime_type.to_string()))
    }
}

/// Guess a MIME type from a file extension. Used by the CLI when
/// registering local files; the engine itself only consumes MIME types.
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some("text/plain"),
        "md" => Some("text/markdown"),
        _ => None,
    }
}
