// Named-entity recognition over extracted résumé text.
// The model itself is a black box behind `EntityRecognizer`; this module only
// feeds it bounded windows of text and maps its spans back to document offsets.

pub mod bio;
pub mod http;
#[cfg(test)]
pub mod mock;
#[cfg(feature = "onnx-ner")]
pub mod onnx;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[cfg(feature = "onnx-ner")]
    #[error("Model could not be loaded: {0}")]
    ModelLoad(String),

    #[cfg(feature = "onnx-ner")]
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// One recognized span. `span` is the `(start, end)` byte range of `text` in
/// the input passed to the recognizer, `None` when the model's output could not
/// be located in the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub label: String,
    pub text: String,
    pub span: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A pretrained token-classification model.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Human-readable description of the backing model, shown in the UI.
    fn name(&self) -> &str;

    /// Recognizes entities in `text`. Implementations may assume `text` fits
    /// the model's input size; use [`recognize_document`] for whole documents.
    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, NerError>;
}

/// Runs `recognizer` over `text` in windows of at most `max_chars` characters
/// and returns the entities in document order with document offsets.
pub async fn recognize_document(
    recognizer: &dyn EntityRecognizer,
    text: &str,
    max_chars: usize,
) -> Result<Vec<Entity>, NerError> {
    let mut entities = Vec::new();
    for (offset, window) in split_windows(text, max_chars) {
        let found = recognizer.recognize(window).await?;
        entities.extend(found.into_iter().map(|mut e| {
            e.span = e.span.map(|(start, end)| (start + offset, end + offset));
            e
        }));
    }
    Ok(entities)
}

/// Splits `text` into `(byte_offset, window)` pairs of at most `max_chars`
/// characters, cutting at the last whitespace inside the limit when there is
/// one. Whitespace-only windows are skipped.
pub fn split_windows(text: &str, max_chars: usize) -> Vec<(usize, &str)> {
    let max_chars = max_chars.max(1);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let end = if hard_end < rest.len() {
            rest[..hard_end]
                .rfind(char::is_whitespace)
                .filter(|&i| i > 0)
                .unwrap_or(hard_end)
        } else {
            hard_end
        };

        let window = &rest[..end];
        if !window.trim().is_empty() {
            windows.push((start, window));
        }
        start += end;
    }

    windows
}

/// Narrows `text[start..end]` to its non-whitespace content. Returns the
/// adjusted byte range with the trimmed slice, or `None` when the range is not
/// a valid slice of `text` or holds only whitespace.
pub fn trimmed_span(text: &str, start: usize, end: usize) -> Option<((usize, usize), &str)> {
    let raw = text.get(start..end)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = start + (raw.len() - raw.trim_start().len());
    Some(((start, start + trimmed.len()), trimmed))
}

/// Removes a `B-`/`I-` tag prefix: `B-ORG` → `ORG`.
pub fn strip_bio_prefix(label: &str) -> &str {
    label
        .strip_prefix("B-")
        .or_else(|| label.strip_prefix("I-"))
        .unwrap_or(label)
}
