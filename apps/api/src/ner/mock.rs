use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Entity, EntityRecognizer, NerError};

/// Test recognizer: tags every occurrence of the configured terms.
pub struct MockRecognizer {
    terms: Vec<(String, String)>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn with_terms(terms: &[(&str, &str)]) -> Self {
        Self {
            terms: terms
                .iter()
                .map(|(t, l)| (t.to_string(), l.to_string()))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A recognizer whose every call fails like an unreachable model.
    pub fn failing() -> Self {
        Self {
            terms: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityRecognizer for MockRecognizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, NerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NerError::Api {
                status: 503,
                message: "model unavailable".to_string(),
            });
        }

        let mut entities: Vec<Entity> = self
            .terms
            .iter()
            .flat_map(|(term, label)| {
                text.match_indices(term.as_str()).map(move |(start, m)| Entity {
                    label: label.clone(),
                    text: m.to_string(),
                    span: Some((start, start + m.len())),
                    score: Some(0.99),
                })
            })
            .collect();
        entities.sort_by_key(|e| e.span);
        Ok(entities)
    }
}
