// Server-rendered upload page. One Handlebars template serves both the empty
// form and the results; Handlebars escapes every `{{value}}` as HTML.

use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

use crate::extraction::SUPPORTED_EXTENSIONS;
use crate::models::document::{DocumentOutcome, DocumentResult};

const PAGE_TEMPLATE: &str = "page";
const PAGE_TITLE: &str = "Resume_Parser";
const HEADING: &str = "Resume Parser Task";

pub fn build_templates() -> Result<Handlebars<'static>, TemplateError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string(PAGE_TEMPLATE, include_str!("../../templates/page.hbs"))?;
    Ok(handlebars)
}

/// Sidebar facts that do not change between requests.
#[derive(Debug, Clone, Serialize)]
pub struct SidebarInfo {
    pub model_name: String,
    pub formats: String,
    pub accept: String,
    pub upload_limit: String,
}

impl SidebarInfo {
    pub fn new(model_name: &str, max_upload_bytes: usize) -> Self {
        Self {
            model_name: model_name.to_string(),
            formats: SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_uppercase())
                .collect::<Vec<_>>()
                .join(", "),
            accept: SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(","),
            upload_limit: format_bytes(max_upload_bytes),
        }
    }
}

#[derive(Debug, Serialize)]
struct PageView<'a> {
    page_title: &'static str,
    heading: &'static str,
    #[serde(flatten)]
    sidebar: &'a SidebarInfo,
    error: Option<&'a str>,
    documents: Vec<DocumentView>,
}

#[derive(Debug, Serialize)]
struct DocumentView {
    file_name: String,
    entity_count: usize,
    error: Option<String>,
    labels: Vec<String>,
    cells: Vec<String>,
}

impl From<&DocumentResult> for DocumentView {
    fn from(result: &DocumentResult) -> Self {
        match &result.outcome {
            DocumentOutcome::Parsed {
                table, entity_count, ..
            } => {
                let (labels, cells) = table.row().into_iter().unzip();
                DocumentView {
                    file_name: result.file_name.clone(),
                    entity_count: *entity_count,
                    error: None,
                    labels,
                    cells,
                }
            }
            DocumentOutcome::Failed { error } => DocumentView {
                file_name: result.file_name.clone(),
                entity_count: 0,
                error: Some(error.clone()),
                labels: Vec::new(),
                cells: Vec::new(),
            },
        }
    }
}

/// Renders the page with the given documents (none for the empty form).
pub fn render_page(
    templates: &Handlebars<'static>,
    sidebar: &SidebarInfo,
    documents: &[DocumentResult],
    error: Option<&str>,
) -> Result<String, RenderError> {
    let view = PageView {
        page_title: PAGE_TITLE,
        heading: HEADING,
        sidebar,
        error,
        documents: documents.iter().map(DocumentView::from).collect(),
    };
    templates.render(PAGE_TEMPLATE, &view)
}

fn format_bytes(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{} MB", bytes / MB)
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{bytes} B")
    }
}
