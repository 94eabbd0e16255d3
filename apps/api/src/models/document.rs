use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::extraction::DocumentKind;
use crate::models::table::EntityTable;

/// Outcome of processing one uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub file_name: String,
    pub kind: Option<DocumentKind>,
    pub processed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Parsed {
        table: EntityTable,
        entity_count: usize,
        text_chars: usize,
    },
    Failed {
        error: String,
    },
}

impl DocumentResult {
    pub fn table(&self) -> Option<&EntityTable> {
        match &self.outcome {
            DocumentOutcome::Parsed { table, .. } => Some(table),
            DocumentOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            DocumentOutcome::Parsed { .. } => None,
            DocumentOutcome::Failed { error } => Some(error),
        }
    }
}
