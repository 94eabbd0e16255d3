//! DOCX text extraction.
//!
//! A .docx file is a ZIP container of WordprocessingML parts. Text lives in
//! `w:t` runs inside `w:p` paragraphs; headers and footers are separate parts
//! and are read before and after the body respectively.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const BODY_PART: &str = "word/document.xml";

/// Extracts the text of a DOCX document as a single line.
///
/// Lines are flattened: empty lines are dropped, tabs become spaces and the
/// remaining lines are joined with one space. A container without a body part
/// yields `" "`.
pub fn extract_text_from_docx(path: &Path) -> Result<String, ExtractionError> {
    let file = File::open(path)?;
    let raw = read_docx_parts(file)?;
    match raw {
        Some(raw) => Ok(flatten_lines(&raw)),
        None => {
            tracing::warn!("{} has no {BODY_PART}; treating as empty", path.display());
            Ok(" ".to_string())
        }
    }
}

/// Reads headers, body and footers in document order. Returns `None` when the
/// archive has no body part.
fn read_docx_parts<R: Read + Seek>(reader: R) -> Result<Option<String>, ExtractionError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut headers = Vec::new();
    let mut footers = Vec::new();
    for name in archive.file_names() {
        if is_part(name, "word/header") {
            headers.push(name.to_string());
        } else if is_part(name, "word/footer") {
            footers.push(name.to_string());
        }
    }
    headers.sort();
    footers.sort();

    let body = match read_part(&mut archive, BODY_PART)? {
        Some(xml) => xml,
        None => return Ok(None),
    };

    let mut text = String::new();
    for name in &headers {
        if let Some(xml) = read_part(&mut archive, name)? {
            text.push_str(&wordml_to_text(&xml)?);
        }
    }
    text.push_str(&wordml_to_text(&body)?);
    for name in &footers {
        if let Some(xml) = read_part(&mut archive, name)? {
            text.push_str(&wordml_to_text(&xml)?);
        }
    }

    Ok(Some(text))
}

fn is_part(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix) && name.ends_with(".xml")
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractionError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Converts WordprocessingML markup to text: `w:t` contributes its content,
/// `w:tab` a tab, `w:br`/`w:cr` a newline, and each paragraph ends with a
/// blank line.
fn wordml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"t" {
                    in_run_text = true;
                }
            }
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                text.push_str(&t.unescape()?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Drops empty lines, replaces tabs with spaces and joins lines with a space.
fn flatten_lines(raw: &str) -> String {
    raw.split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| line.replace('\t', " "))
        .collect::<Vec<_>>()
        .join(" ")
}
