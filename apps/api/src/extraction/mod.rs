// Text extraction: dispatches an uploaded document to the parser for its extension.
// Every function here is blocking; async callers must go through tokio::task::spawn_blocking.

pub mod doc;
pub mod docx;
pub mod pdf;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Formats accepted by the upload form, in display order.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type '{0}' (expected pdf, doc or docx)")]
    UnsupportedFormat(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX archive could not be read: {0}")]
    DocxArchive(#[from] zip::result::ZipError),

    #[error("DOCX markup could not be parsed: {0}")]
    DocxXml(#[from] quick_xml::Error),

    #[error("DOC converter '{command}' failed: {message}")]
    DocConverter { command: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document family, resolved from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Doc,
}

impl DocumentKind {
    pub fn from_file_name(name: &str) -> Result<Self, ExtractionError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "doc" => Ok(DocumentKind::Doc),
            _ => Err(ExtractionError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Doc => "doc",
        }
    }
}

/// Settings the extractors need beyond the file itself.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Command used to convert legacy `.doc` files to text.
    pub doc_converter: String,
}

/// Extracts plain text from `path`, choosing the parser by `kind`.
pub fn extract_text(
    path: &Path,
    kind: DocumentKind,
    options: &ExtractOptions,
) -> Result<String, ExtractionError> {
    let text = match kind {
        DocumentKind::Pdf => pdf::extract_text_from_pdf(path)?,
        DocumentKind::Docx => docx::extract_text_from_docx(path)?,
        DocumentKind::Doc => doc::extract_text_from_doc(path, &options.doc_converter)?,
    };
    tracing::debug!(
        "Extracted {} chars from {} ({:?})",
        text.chars().count(),
        path.display(),
        kind
    );
    Ok(text)
}

/// Strips directory components and characters that are unsafe in file names.
/// Returns `None` when nothing usable is left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() => c,
            '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
