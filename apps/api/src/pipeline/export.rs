use std::io::Write;
use std::path::Path;

use crate::models::document::DocumentResult;

/// Writes parsed documents as CSV: a `file` column followed by every label seen
/// across the batch (first-appearance order), one row per parsed document.
/// Failed documents are skipped; labels a document lacks are empty cells.
pub fn write_csv<W: Write>(results: &[DocumentResult], writer: W) -> Result<(), csv::Error> {
    write_records(results, csv::Writer::from_writer(writer))
}

/// Same as [`write_csv`], creating (or truncating) the file at `path`.
pub fn write_csv_file(results: &[DocumentResult], path: &Path) -> Result<(), csv::Error> {
    write_records(results, csv::Writer::from_path(path)?)
}

fn write_records<W: Write>(
    results: &[DocumentResult],
    mut wtr: csv::Writer<W>,
) -> Result<(), csv::Error> {
    let mut labels: Vec<&str> = Vec::new();
    for table in results.iter().filter_map(|r| r.table()) {
        for label in table.labels() {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }

    let mut header = vec!["file"];
    header.extend(labels.iter().copied());
    wtr.write_record(&header)?;

    for result in results {
        let Some(table) = result.table() else {
            continue;
        };
        let mut record = vec![result.file_name.clone()];
        record.extend(labels.iter().map(|label| {
            table
                .get(label)
                .map(|column| column.joined())
                .unwrap_or_default()
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::DocumentOutcome;
    use crate::models::table::{EntityColumn, EntityTable};
    use chrono::Utc;

    fn parsed(file: &str, columns: &[(&str, &[&str])]) -> DocumentResult {
        let table = EntityTable {
            columns: columns
                .iter()
                .map(|(label, values)| EntityColumn {
                    label: label.to_string(),
                    values: values.iter().map(|v| v.to_string()).collect(),
                })
                .collect(),
        };
        DocumentResult {
            file_name: file.to_string(),
            kind: None,
            processed_at: Utc::now(),
            outcome: DocumentOutcome::Parsed {
                entity_count: 0,
                text_chars: 0,
                table,
            },
        }
    }

    #[test]
    fn test_union_of_labels_with_empty_cells() {
        let results = vec![
            parsed("a.pdf", &[("NAME", &["Jane Doe"]), ("SKILLS", &["Rust", "Go"])]),
            parsed("b.docx", &[("NAME", &["John Roe"]), ("DEGREE", &["BSc"])]),
            DocumentResult {
                file_name: "c.txt".to_string(),
                kind: None,
                processed_at: Utc::now(),
                outcome: DocumentOutcome::Failed {
                    error: "unsupported".to_string(),
                },
            },
        ];

        let mut out = Vec::new();
        write_csv(&results, &mut out).unwrap();
        let csv = String::from_utf8(out).unwrap();

        assert_eq!(
            csv,
            "file,NAME,SKILLS,DEGREE\na.pdf,Jane Doe,\"Rust, Go\",\nb.docx,John Roe,,BSc\n"
        );
    }

    #[test]
    fn test_file_output_matches_writer_output() {
        let results = vec![parsed("a.pdf", &[("NAME", &["Jane Doe"])])];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entities.csv");
        std::fs::write(&path, "stale contents that must be replaced\n").unwrap();

        write_csv_file(&results, &path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "file,NAME\na.pdf,Jane Doe\n"
        );
    }

    #[test]
    fn test_file_output_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("entities.csv");
        assert!(write_csv_file(&[], &path).is_err());
    }

    #[test]
    fn test_no_documents_writes_header_only() {
        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "file\n");
    }
}
