#![cfg_attr(not(feature = "onnx-ner"), allow(dead_code))]

use super::{strip_bio_prefix, trimmed_span, Entity};

/// Model prediction for a single token. `start`/`end` are byte offsets of the
/// token in the input text; special tokens have `start == end`.
#[derive(Debug, Clone)]
pub struct TokenPrediction {
    pub label: String,
    pub score: f32,
    pub start: usize,
    pub end: usize,
}

struct OpenSpan {
    label: String,
    start: usize,
    end: usize,
    score_sum: f32,
    tokens: usize,
}

impl OpenSpan {
    fn close(self, text: &str) -> Option<Entity> {
        let (span, span_text) = trimmed_span(text, self.start, self.end)?;
        Some(Entity {
            label: self.label,
            text: span_text.to_string(),
            span: Some(span),
            score: Some(self.score_sum / self.tokens as f32),
        })
    }
}

/// Merges per-token BIO predictions into entity spans.
///
/// `B-X` opens a span, `I-X` (or a bare `X`) extends an open `X` span or opens
/// one, `O` closes the open span. A span's score is the mean of its tokens.
pub fn aggregate(text: &str, tokens: &[TokenPrediction]) -> Vec<Entity> {
    let mut entities = Vec::new();
    let mut open: Option<OpenSpan> = None;

    for token in tokens.iter().filter(|t| t.start < t.end) {
        if token.label == "O" {
            if let Some(span) = open.take() {
                entities.extend(span.close(text));
            }
            continue;
        }

        let label = strip_bio_prefix(&token.label);
        let begins = token.label.starts_with("B-");

        match open.as_mut() {
            Some(span) if !begins && span.label == label => {
                span.end = token.end;
                span.score_sum += token.score;
                span.tokens += 1;
            }
            _ => {
                if let Some(span) = open.take() {
                    entities.extend(span.close(text));
                }
                open = Some(OpenSpan {
                    label: label.to_string(),
                    start: token.start,
                    end: token.end,
                    score_sum: token.score,
                    tokens: 1,
                });
            }
        }
    }

    if let Some(span) = open {
        entities.extend(span.close(text));
    }

    entities
}
