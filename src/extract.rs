//! Document text extraction and processing.
//!
//! Callers supply raw bytes, a filename and an optional content type; this
//! module returns a chunked [`Document`]. Dispatch goes by content type
//! first, then by filename extension, then falls back to plain text.
//!
//! | Kind | Content types | Extensions | Extraction |
//! |------|---------------|-----------|------------|
//! | Text | `text/plain`, `text/markdown` | `txt`, `md`, `markdown` | UTF-8 decode |
//! | JSON | `application/json` | `json` | pretty-printed, raw text if invalid |
//! | HTML | `text/html` | `html`, `htm` | visible text, script/style removed |
//! | PDF | `application/pdf` | `pdf` | `pdf-extract` |

use anyhow::{Context, Result};
use std::path::Path;

use qa_harness_core::chunk::{chunk_text, ChunkOptions};
use qa_harness_core::markup;
use qa_harness_core::models::{Document, DocumentMetadata};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_JSON: &str = "application/json";
pub const MIME_HTML: &str = "text/html";
pub const MIME_PDF: &str = "application/pdf";

/// Extraction failure for a single document.
#[derive(Debug)]
pub enum ExtractError {
    NotUtf8,
    Pdf(String),
    Empty,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotUtf8 => write!(f, "content is not valid UTF-8"),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Empty => write!(f, "no text content found"),
        }
    }
}

impl std::error::Error for ExtractError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
    Html,
    Pdf,
}

impl Format {
    fn from_content_type(content_type: &str) -> Option<Self> {
        // Drop parameters such as "; charset=utf-8".
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_TEXT | MIME_MARKDOWN => Some(Format::Text),
            MIME_JSON => Some(Format::Json),
            MIME_HTML => Some(Format::Html),
            MIME_PDF => Some(Format::Pdf),
            _ => None,
        }
    }

    fn from_extension(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "markdown" => Some(Format::Text),
            "json" => Some(Format::Json),
            "html" | "htm" => Some(Format::Html),
            "pdf" => Some(Format::Pdf),
            _ => None,
        }
    }
}

/// Best-guess content type for a file on disk, from its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let name = path.to_string_lossy();
    match Format::from_extension(&name) {
        Some(Format::Json) => MIME_JSON,
        Some(Format::Html) => MIME_HTML,
        Some(Format::Pdf) => MIME_PDF,
        Some(Format::Text) if name.to_ascii_lowercase().ends_with(".txt") => MIME_TEXT,
        Some(Format::Text) => MIME_MARKDOWN,
        None => MIME_TEXT,
    }
}

/// Extract plain text from `bytes`. Never panics on malformed input.
pub fn extract_text(
    bytes: &[u8],
    filename: &str,
    content_type: Option<&str>,
) -> Result<String, ExtractError> {
    let format = content_type
        .and_then(Format::from_content_type)
        .or_else(|| Format::from_extension(filename))
        .unwrap_or(Format::Text);

    let text = match format {
        Format::Text => decode_utf8(bytes)?,
        Format::Json => {
            let raw = decode_utf8(bytes)?;
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(value) => serde_json::to_string_pretty(&value).unwrap_or(raw),
                Err(_) => raw,
            }
        }
        Format::Html => markup::parse(&decode_utf8(bytes)?).visible_text(),
        Format::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?,
    };

    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ExtractError::NotUtf8)
}

/// Extract, chunk and wrap one uploaded document.
///
/// The reported content type is the one supplied, or the one inferred from
/// the filename when none was given.
pub fn process_document(
    bytes: &[u8],
    filename: &str,
    content_type: Option<&str>,
    options: &ChunkOptions,
) -> Result<Document> {
    let content_type = content_type
        .map(str::to_string)
        .unwrap_or_else(|| content_type_for(Path::new(filename)).to_string());

    let text_content = extract_text(bytes, filename, Some(&content_type))
        .with_context(|| format!("Error processing {}", filename))?;
    let chunks = chunk_text(&text_content, filename, options)
        .with_context(|| format!("Error processing {}", filename))?;

    Ok(Document {
        filename: filename.to_string(),
        content_type: content_type.clone(),
        metadata: DocumentMetadata {
            source: filename.to_string(),
            content_type,
            chunk_count: chunks.len(),
        },
        text_content,
        chunks,
    })
}
