//! Line Extractor: uploaded document → ordered, non-blank lines.
//!
//! Word documents are not parsed here; building and rewriting .docx files
//! belongs to the document service.

use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported document type '{0}'; upload .txt, .md or .pdf, or paste the text")]
    Unsupported(String),

    #[error("document is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("document is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("could not read PDF: {0}")]
    Pdf(String),

    #[error("document contains no text")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Text,
    Pdf,
}

fn kind_of(filename: &str) -> Result<DocumentKind, ExtractError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        None | Some("txt") | Some("md") | Some("text") => Ok(DocumentKind::Text),
        Some("pdf") => Ok(DocumentKind::Pdf),
        Some(other) => Err(ExtractError::Unsupported(other.to_string())),
    }
}

/// Extracts the document's lines. CPU-bound for PDFs; call from a blocking task.
pub fn extract_lines(filename: &str, bytes: &[u8], max_bytes: usize) -> Result<Vec<String>, ExtractError> {
    if bytes.len() > max_bytes {
        return Err(ExtractError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let text = match kind_of(filename)? {
        DocumentKind::Text => std::str::from_utf8(bytes)
            .map_err(|_| ExtractError::InvalidUtf8)?
            .to_string(),
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?,
    };

    let lines = text_to_lines(&text);
    if lines.is_empty() {
        return Err(ExtractError::Empty);
    }
    debug!("Extracted {} lines from {}", lines.len(), filename);
    Ok(lines)
}

/// Splits on `\n` / `\r\n`, drops whitespace-only lines, keeps the rest verbatim.
pub fn text_to_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}
