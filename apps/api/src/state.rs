use std::sync::Arc;

use handlebars::Handlebars;

use crate::config::Config;
use crate::pipeline::PipelineContext;
use crate::ui::SidebarInfo;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Recognizer, upload directory and worker count for document processing.
    pub pipeline: Arc<PipelineContext>,
    pub templates: Arc<Handlebars<'static>>,
    pub sidebar: Arc<SidebarInfo>,
}

impl AppState {
    pub fn new(config: Config, pipeline: PipelineContext, templates: Handlebars<'static>) -> Self {
        let sidebar = SidebarInfo::new(pipeline.recognizer.name(), config.max_upload_bytes);
        Self {
            config,
            pipeline: Arc::new(pipeline),
            templates: Arc::new(templates),
            sidebar: Arc::new(sidebar),
        }
    }
}
