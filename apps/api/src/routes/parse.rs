use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::document::DocumentResult;
use crate::pipeline::{export::write_csv, process_batch, UploadedFile};
use crate::state::AppState;
use crate::ui::render_page;

/// Multipart field names that carry résumé files.
const UPLOAD_FIELDS: [&str; 2] = ["resume", "file"];

#[derive(Debug, Default, Deserialize)]
pub struct ParseQuery {
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct ParseResponse {
    pub documents: Vec<DocumentResult>,
}

/// GET /
pub async fn handle_index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let html = render_page(&state.templates, &state.sidebar, &[], None)?;
    Ok(Html(html))
}

/// POST /parse
/// Renders the upload page with one entity table per uploaded document.
pub async fn handle_parse_page(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Html<String>), AppError> {
    let files = match read_uploads(multipart).await {
        Ok(files) => files,
        Err(AppError::Validation(msg)) => {
            let html = render_page(&state.templates, &state.sidebar, &[], Some(msg.as_str()))?;
            return Ok((StatusCode::BAD_REQUEST, Html(html)));
        }
        Err(e) => return Err(e),
    };

    let results = process_batch(&state.pipeline, files).await;
    let html = render_page(&state.templates, &state.sidebar, &results, None)?;
    Ok((StatusCode::OK, Html(html)))
}

/// POST /api/v1/parse[?format=csv]
pub async fn handle_parse_api(
    State(state): State<AppState>,
    Query(query): Query<ParseQuery>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let as_csv = match query.format.as_deref() {
        None | Some("json") => false,
        Some("csv") => true,
        Some(other) => {
            return Err(AppError::Validation(format!(
                "Unknown format '{other}' (expected json or csv)"
            )))
        }
    };

    let files = read_uploads(multipart).await?;
    let documents = process_batch(&state.pipeline, files).await;

    if as_csv {
        let mut out = Vec::new();
        write_csv(&documents, &mut out)?;
        return Ok((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            out,
        )
            .into_response());
    }

    Ok(Json(ParseResponse { documents }).into_response())
}

/// Collects every file field from the form. Browsers submit an empty part for
/// an untouched file input; those are skipped.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let is_upload = field
            .name()
            .map(|n| UPLOAD_FIELDS.contains(&n))
            .unwrap_or(false);
        if !is_upload {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        if file_name.is_empty() && bytes.is_empty() {
            continue;
        }

        tracing::debug!("Received upload '{file_name}' ({} bytes)", bytes.len());
        files.push(UploadedFile {
            file_name: if file_name.is_empty() {
                "upload".to_string()
            } else {
                file_name
            },
            bytes,
        });
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "No résumé was uploaded; attach a PDF, DOC or DOCX file in the 'resume' field"
                .to_string(),
        ));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::ner::mock::MockRecognizer;
    use crate::pipeline::PipelineContext;
    use crate::routes::build_router;
    use crate::state::AppState;
    use crate::ui::build_templates;

    const BOUNDARY: &str = "X-RESUME-BOUNDARY";

    fn app(dir: &std::path::Path, max_upload_bytes: usize) -> axum::Router {
        let mut config = Config::for_tests(dir.to_path_buf());
        config.doc_converter = "cat".to_string();
        config.max_upload_bytes = max_upload_bytes;
        let recognizer = MockRecognizer::with_terms(&[
            ("Jane Doe", "NAME"),
            ("Rust", "SKILLS"),
            ("SQL", "SKILLS"),
            ("Acme", "COMPANIES WORKED AT"),
        ]);
        let pipeline = PipelineContext::new(&config, Arc::new(recognizer));
        build_router(AppState::new(config, pipeline, build_templates().unwrap()))
    }

    fn multipart_body(parts: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (field, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_renders_upload_form() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("Resume Parser Task"));
        assert!(html.contains("name=\"resume\""));
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "mock");
    }

    #[tokio::test]
    async fn test_api_without_files_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/api/v1/parse", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_api_unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("resume", "cv.doc", "Jane Doe")]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/api/v1/parse?format=xml", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_api_returns_grouped_entities_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            ("resume", "jane.doc", "Jane Doe\nAcme\nRust, SQL"),
            ("resume", "notes.txt", "Rust"),
        ]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/api/v1/parse", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        let docs = json["documents"].as_array().unwrap();
        assert_eq!(docs.len(), 2);

        assert_eq!(docs[0]["file_name"], "jane.doc");
        assert_eq!(docs[0]["status"], "parsed");
        assert_eq!(docs[0]["kind"], "doc");
        let columns = docs[0]["table"]["columns"].as_array().unwrap();
        assert_eq!(columns[0]["label"], "NAME");
        assert_eq!(columns[1]["label"], "COMPANIES WORKED AT");
        assert_eq!(columns[2]["values"], serde_json::json!(["Rust", "SQL"]));

        assert_eq!(docs[1]["status"], "failed");
        assert!(docs[1]["error"].as_str().unwrap().contains("Unsupported"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_api_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("resume", "jane.doc", "Jane Doe knows Rust and SQL")]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/api/v1/parse?format=csv", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            body_string(response).await,
            "file,NAME,SKILLS\njane.doc,Jane Doe,\"Rust, SQL\"\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_page_renders_table() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("resume", "jane.doc", "Jane Doe, Rust")]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/parse", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("<th>NAME</th><th>SKILLS</th>"));
        assert!(html.contains("<td>Jane Doe</td><td>Rust</td>"));
    }

    #[tokio::test]
    async fn test_page_without_files_shows_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[("resume", "", "")]);
        let response = app(dir.path(), 1024 * 1024)
            .oneshot(upload_request("/parse", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        let html = body_string(response).await;
        assert!(html.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = "a".repeat(4096);
        let body = multipart_body(&[("resume", "cv.doc", big.as_str())]);
        let response = app(dir.path(), 1024)
            .oneshot(upload_request("/api/v1/parse", body))
            .await
            .unwrap();

        assert_eq!(response.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
