use serde::Serialize;

use crate::ner::Entity;

/// All spans recognized for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityColumn {
    pub label: String,
    pub values: Vec<String>,
}

impl EntityColumn {
    /// The column's single cell: every span joined with ", ".
    pub fn joined(&self) -> String {
        self.values.join(", ")
    }
}

/// Entities of one document grouped by label.
///
/// Labels are unique and keep the order in which they first appear in the
/// document; values keep document order and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityTable {
    pub columns: Vec<EntityColumn>,
}

impl EntityTable {
    pub fn from_entities(entities: &[Entity]) -> Self {
        let mut columns: Vec<EntityColumn> = Vec::new();
        for entity in entities {
            match columns.iter_mut().find(|c| c.label == entity.label) {
                Some(column) => column.values.push(entity.text.clone()),
                None => columns.push(EntityColumn {
                    label: entity.label.clone(),
                    values: vec![entity.text.clone()],
                }),
            }
        }
        Self { columns }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<&EntityColumn> {
        self.columns.iter().find(|c| c.label == label)
    }

    /// The table's only row: `(label, joined spans)` per column.
    pub fn row(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .map(|c| (c.label.clone(), c.joined()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
