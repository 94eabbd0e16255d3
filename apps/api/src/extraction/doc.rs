use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use super::ExtractionError;

/// Converts a legacy binary `.doc` file to text with an external converter
/// (`antiword` by default) that prints the document text on stdout.
///
/// The converter is optional: when the command is not installed the document
/// is treated as empty (`" "`) and a warning is logged.
pub fn extract_text_from_doc(path: &Path, converter: &str) -> Result<String, ExtractionError> {
    let output = match Command::new(converter).arg(path).output() {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(
                "DOC converter '{converter}' is not installed; {} parsed as empty",
                path.display()
            );
            return Ok(" ".to_string());
        }
        Err(e) => return Err(e.into()),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ExtractionError::DocConverter {
            command: converter.to_string(),
            message: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
