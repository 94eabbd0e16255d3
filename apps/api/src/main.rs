mod config;
mod errors;
mod extraction;
mod models;
mod ner;
mod pipeline;
mod routes;
mod state;
mod ui;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, NerBackend};
use crate::models::document::DocumentResult;
use crate::ner::http::HttpRecognizer;
use crate::ner::EntityRecognizer;
use crate::pipeline::export::{write_csv, write_csv_file};
use crate::pipeline::{process_batch, PipelineContext, UploadedFile};
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "resume-parser", version, about = "Extract named entities from résumés")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web UI and HTTP API (default)
    Serve,
    /// Parse local résumé files and print their entity tables
    Parse {
        /// PDF, DOC or DOCX files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print one CSV table for all files instead of per-file tables
        #[arg(long)]
        csv: bool,
        /// Write the CSV table to FILE instead of stdout (implies --csv).
        /// PDF parsing may print font diagnostics on stdout.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first; malformed values abort startup
    let config = Config::from_env()?;

    // Initialize structured logging (stderr, so `parse --csv` output stays clean)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Resume Parser v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!(
            "Could not create upload directory '{}'",
            config.upload_dir.display()
        )
    })?;

    let recognizer = build_recognizer(&config)?;
    info!("Entity recognizer: {}", recognizer.name());

    let pipeline = PipelineContext::new(&config, recognizer);
    info!(
        "Pipeline: {} worker(s), uploads in {} (keep: {})",
        pipeline.workers,
        pipeline.upload_dir.display(),
        pipeline.keep_uploads
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pipeline).await,
        Command::Parse { files, csv, output } => {
            let target = match (output, csv) {
                (Some(path), _) => Output::CsvFile(path),
                (None, true) => Output::CsvStdout,
                (None, false) => Output::Tables,
            };
            parse_files(&pipeline, files, target).await
        }
    }
}

fn build_recognizer(config: &Config) -> Result<Arc<dyn EntityRecognizer>> {
    match config.ner_backend {
        NerBackend::Http => Ok(Arc::new(HttpRecognizer::new(
            config.ner_model_url.clone(),
            config.ner_api_token.clone(),
        )?)),
        #[cfg(feature = "onnx-ner")]
        NerBackend::Onnx => Ok(Arc::new(ner::onnx::OnnxRecognizer::load(
            &config.ner_model_dir,
        )?)),
        #[cfg(not(feature = "onnx-ner"))]
        NerBackend::Onnx => anyhow::bail!(
            "NER_BACKEND=onnx (model dir '{}') requires building with `--features onnx-ner`",
            config.ner_model_dir.display()
        ),
    }
}

async fn serve(config: Config, pipeline: PipelineContext) -> Result<()> {
    let templates = ui::build_templates().context("Failed to load page templates")?;
    let port = config.port;
    let state = AppState::new(config, pipeline, templates);

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Where `parse` sends its results.
enum Output {
    Tables,
    CsvStdout,
    CsvFile(PathBuf),
}

/// Runs the pipeline over local files and writes the results.
async fn parse_files(pipeline: &PipelineContext, paths: Vec<PathBuf>, output: Output) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Could not read '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile {
            file_name,
            bytes: Bytes::from(bytes),
        });
    }

    let results = process_batch(pipeline, files).await;

    match output {
        Output::Tables => results.iter().for_each(print_result),
        Output::CsvStdout => {
            write_csv(&results, std::io::stdout().lock()).context("Failed to write CSV")?
        }
        Output::CsvFile(path) => {
            write_csv_file(&results, &path)
                .with_context(|| format!("Failed to write CSV to '{}'", path.display()))?;
            info!("Wrote {} document(s) to {}", results.len(), path.display());
        }
    }

    Ok(())
}

fn print_result(result: &DocumentResult) {
    println!("== {} ==", result.file_name);
    if let Some(error) = result.error() {
        println!("error: {error}");
    } else if let Some(table) = result.table() {
        if table.is_empty() {
            println!("(no entities found)");
        }
        for (label, cell) in table.row() {
            println!("{label}: {cell}");
        }
    }
    println!();
}
