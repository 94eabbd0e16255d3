use std::path::Path;

use super::ExtractionError;

/// Reads every page of the PDF at `path` and returns the concatenated text.
///
/// pdf-extract panics on some malformed inputs instead of returning an error,
/// so the call is wrapped in `catch_unwind` and a panic surfaces as
/// `ExtractionError::Pdf`.
pub fn extract_text_from_pdf(path: &Path) -> Result<String, ExtractionError> {
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text(path));

    let text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => return Err(ExtractionError::Pdf(e.to_string())),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "parser panicked".to_string());
            return Err(ExtractionError::Pdf(message));
        }
    };

    if text.trim().is_empty() {
        // Image-only (scanned) PDFs carry no text layer.
        tracing::warn!("PDF {} has no extractable text", path.display());
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_garbage_bytes_are_an_error_not_a_panic() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"this is not a pdf at all").unwrap();

        let result = extract_text_from_pdf(file.path());
        assert!(matches!(result, Err(ExtractionError::Pdf(_))));
    }

    /// A structurally valid one-page PDF whose page has no `/MediaBox`, which
    /// pdf-extract treats as a hard assumption and panics on.
    fn pdf_without_media_box() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }

        let xref_at = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
                objects.len() + 1
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_parser_panic_becomes_pdf_error() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(&pdf_without_media_box()).unwrap();

        match extract_text_from_pdf(file.path()) {
            Err(ExtractionError::Pdf(message)) => assert!(message.contains("MediaBox"), "{message}"),
            other => panic!("expected Pdf error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = extract_text_from_pdf(Path::new("/nonexistent/resume.pdf"));
        assert!(result.is_err());
    }
}
