pub mod health;
pub mod parse;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Upload page
        .route("/", get(parse::handle_index))
        .route("/parse", post(parse::handle_parse_page))
        // JSON / CSV API
        .route("/api/v1/parse", post(parse::handle_parse_api))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
