//! Text extraction from uploaded PDF documents.
//!
//! Uses pdf-extract; extraction failures are reported as typed errors so the
//! HTTP layer can surface them as client errors instead of crashing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read PDF: {0}")]
    ReadError(String),
    #[error("no text content found in PDF")]
    NoContent,
}

/// Extract plain text from in-memory PDF bytes.
///
/// Returns `NoContent` when the document yields only whitespace, which covers
/// scanned image-only PDFs.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| ExtractError::ReadError(e.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::NoContent);
    }
    Ok(trimmed.to_string())
}
