// Document pipeline: save upload → extract text → recognize entities → group into a table.
// Files in a batch are independent; they run concurrently up to the configured worker count.

pub mod export;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::extraction::{
    extract_text, sanitize_file_name, DocumentKind, ExtractOptions, ExtractionError,
};
use crate::models::document::{DocumentOutcome, DocumentResult};
use crate::models::table::EntityTable;
use crate::ner::{recognize_document, EntityRecognizer, NerError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Entity recognition failed: {0}")]
    Ner(#[from] NerError),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// A file received from the client, not yet written to disk.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Everything a pipeline run needs; built once at startup and shared.
pub struct PipelineContext {
    pub recognizer: Arc<dyn EntityRecognizer>,
    pub upload_dir: PathBuf,
    pub keep_uploads: bool,
    pub workers: usize,
    pub max_chars: usize,
    pub extract_options: ExtractOptions,
}

impl PipelineContext {
    pub fn new(config: &Config, recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self {
            recognizer,
            upload_dir: config.upload_dir.clone(),
            keep_uploads: config.keep_uploads,
            workers: config.workers,
            max_chars: config.ner_max_chars,
            extract_options: ExtractOptions {
                doc_converter: config.doc_converter.clone(),
            },
        }
    }
}

/// Processes every file, at most `ctx.workers` at a time. Results are in
/// upload order; a failing file yields a `Failed` result and does not affect
/// the others.
pub async fn process_batch(ctx: &PipelineContext, files: Vec<UploadedFile>) -> Vec<DocumentResult> {
    info!("Processing batch of {} file(s)", files.len());
    stream::iter(files)
        .map(|file| process_file(ctx, file))
        .buffered(ctx.workers.max(1))
        .collect()
        .await
}

/// Runs one file through the pipeline.
pub async fn process_file(ctx: &PipelineContext, file: UploadedFile) -> DocumentResult {
    let file_name = file.file_name.clone();
    let kind = DocumentKind::from_file_name(&file_name).ok();

    let outcome = match run(ctx, file).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to parse '{file_name}': {e}");
            DocumentOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    DocumentResult {
        file_name,
        kind,
        processed_at: Utc::now(),
        outcome,
    }
}

async fn run(ctx: &PipelineContext, file: UploadedFile) -> Result<DocumentOutcome, PipelineError> {
    let kind = DocumentKind::from_file_name(&file.file_name)?;
    let text = save_and_extract(ctx, file, kind).await?;

    let entities = recognize_document(ctx.recognizer.as_ref(), &text, ctx.max_chars).await?;
    let table = EntityTable::from_entities(&entities);
    let text_chars = text.chars().count();

    info!(
        "Parsed document: {} chars, {} entities, {} labels",
        text_chars,
        entities.len(),
        table.columns.len()
    );

    Ok(DocumentOutcome::Parsed {
        entity_count: entities.len(),
        text_chars,
        table,
    })
}

/// Writes the upload into the upload directory and extracts its text on a
/// blocking thread. The saved copy is removed afterwards unless uploads are kept.
async fn save_and_extract(
    ctx: &PipelineContext,
    file: UploadedFile,
    kind: DocumentKind,
) -> Result<String, PipelineError> {
    let dir = ctx.upload_dir.clone();
    let keep = ctx.keep_uploads;
    let options = ctx.extract_options.clone();

    tokio::task::spawn_blocking(move || -> Result<String, PipelineError> {
        let mut saved = tempfile::Builder::new()
            .prefix(&format!("{}-", upload_stem(&file.file_name)))
            .suffix(&format!(".{}", kind.extension()))
            .tempfile_in(&dir)
            .map_err(ExtractionError::Io)?;
        saved.write_all(&file.bytes).map_err(ExtractionError::Io)?;
        saved.flush().map_err(ExtractionError::Io)?;

        let text = extract_text(saved.path(), kind, &options);

        if keep {
            match saved.keep() {
                Ok((_, path)) => info!("Saved upload to {}", path.display()),
                Err(e) => warn!("Could not keep upload '{}': {}", file.file_name, e.error),
            }
        }

        Ok(text?)
    })
    .await
    .map_err(|e| PipelineError::Task(e.to_string()))?
}

/// File-name stem used as the prefix of the saved upload.
fn upload_stem(file_name: &str) -> String {
    sanitize_file_name(file_name)
        .as_deref()
        .and_then(|n| Path::new(n).file_stem())
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload")
        .to_string()
}
