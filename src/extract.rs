//! Text extraction for uploaded and scanned documents.
//!
//! Callers supply bytes plus a content type; this module returns plain
//! UTF-8 text. PDFs go through `pdf-extract`, plain text and Markdown are
//! decoded as UTF-8. A scanned PDF with no text layer extracts to an empty
//! string, which is not an error: the document simply contributes no
//! fragments.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Extraction failure; the pipeline skips the document and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Guess a content type from a file name's extension.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Extract plain text from `bytes` of the given content type.
pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8(bytes.to_vec())?),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// [`extract_text`] on the blocking thread pool, so PDF parsing does not
/// stall the async workers.
pub async fn extract_text_blocking(
    bytes: Vec<u8>,
    content_type: String,
) -> Result<String, ExtractError> {
    tokio::task::spawn_blocking(move || extract_text(&bytes, &content_type))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {}", e)))?
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs.
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(tidy_pdf_text(&text))
}

/// Trim trailing spaces and squeeze runs of blank lines to one, keeping
/// paragraph breaks (`\n\n`) for the chunker.
fn tidy_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        blank_run = 0;
        out.push_str(line);
    }
    out
}
