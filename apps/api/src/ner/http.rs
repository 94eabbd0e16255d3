/// Hosted NER model client.
///
/// Speaks the HuggingFace Inference API token-classification format:
/// `{"inputs": "...", "parameters": {"aggregation_strategy": "simple"}}` in,
/// an array of `{entity_group, score, word, start, end}` out. Offsets in the
/// response are character offsets.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{strip_bio_prefix, trimmed_span, Entity, EntityRecognizer, NerError};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT_SECS: u64 = 120;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    aggregation_strategy: &'static str,
}

/// One span returned by the model. Aggregated pipelines send `entity_group`,
/// raw per-token pipelines send `entity`.
#[derive(Debug, Deserialize)]
struct TokenClassification {
    #[serde(alias = "entity")]
    entity_group: String,
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    end: Option<usize>,
    #[serde(default)]
    score: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    error: String,
}

/// Entity recognizer backed by a model served over HTTP.
#[derive(Clone)]
pub struct HttpRecognizer {
    client: Client,
    url: String,
    api_token: Option<String>,
    name: String,
    retry_base_delay: Duration,
}

impl HttpRecognizer {
    pub fn new(url: String, api_token: Option<String>) -> Result<Self, NerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let name = format!("hosted model ({url})");
        Ok(Self {
            client,
            url,
            api_token,
            name,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    #[cfg(test)]
    fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Posts `text` to the model. Retries on 429 (rate limit / model warming up)
    /// and 5xx errors with exponential backoff.
    async fn call(&self, text: &str) -> Result<Vec<TokenClassification>, NerError> {
        let request_body = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters {
                aggregation_strategy: "simple",
            },
        };

        let mut last_error: Option<NerError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(self.retry_base_delay, attempt);
                warn!(
                    "NER call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&self.url).json(&request_body);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(NerError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("NER API returned {}: {}", status, body);
                last_error = Some(NerError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<InferenceError>(&body)
                    .map(|e| e.error)
                    .unwrap_or(body);
                return Err(NerError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let body = response.text().await?;
            let spans: Vec<TokenClassification> = serde_json::from_str(&body)?;
            debug!("NER call succeeded: {} spans", spans.len());
            return Ok(spans);
        }

        match last_error {
            Some(NerError::Api { status: 429, .. }) | None => Err(NerError::RateLimited {
                retries: MAX_RETRIES,
            }),
            Some(e) => Err(e),
        }
    }
}

/// Exponential backoff before retry `attempt` (1-based): base, 2x base, ...
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base * (1 << (attempt - 1))
}

#[async_trait]
impl EntityRecognizer for HttpRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, NerError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let spans = self.call(text).await?;
        Ok(spans_to_entities(text, spans))
    }
}

/// Converts model spans into entities with byte offsets into `text`.
/// The span text is taken from `text` when the offsets are usable, otherwise
/// from the model's `word`, located in `text` when it occurs there verbatim.
fn spans_to_entities(text: &str, spans: Vec<TokenClassification>) -> Vec<Entity> {
    let boundaries = char_boundaries(text);

    spans
        .into_iter()
        .filter_map(|span| {
            let label = strip_bio_prefix(&span.entity_group).to_string();
            if label.is_empty() || label == "O" {
                return None;
            }

            let byte_range = match (span.start, span.end) {
                (Some(s), Some(e)) if s < e => boundaries
                    .get(s)
                    .copied()
                    .zip(boundaries.get(e).copied()),
                _ => None,
            };

            if let Some((bs, be)) = byte_range {
                let (range, slice) = trimmed_span(text, bs, be)?;
                return Some(Entity {
                    label,
                    text: slice.to_string(),
                    span: Some(range),
                    score: span.score,
                });
            }

            let word = span
                .word
                .unwrap_or_default()
                .replace(" ##", "")
                .replace("##", "");
            let word = word.trim();
            if word.is_empty() {
                return None;
            }
            let located = text.find(word).map(|s| (s, s + word.len()));
            if located.is_none() {
                debug!("NER span '{word}' not found in input; keeping it without offsets");
            }

            Some(Entity {
                label,
                text: word.to_string(),
                span: located,
                score: span.score,
            })
        })
        .collect()
}

/// Byte offset of every char index in `text`, plus `text.len()` at the end,
/// so that `boundaries[char_idx]` is a valid slice bound.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}
