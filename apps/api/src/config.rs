use std::path::PathBuf;

use anyhow::{bail, Context, Result};

const DEFAULT_MODEL_URL: &str = "https://api-inference.huggingface.co/models/dslim/bert-base-NER";

/// Which entity recognizer backs the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerBackend {
    /// Hosted token-classification model reached over HTTP.
    Http,
    /// Local ONNX export run in-process (requires the `onnx-ner` feature).
    Onnx,
}

impl std::str::FromStr for NerBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(NerBackend::Http),
            "onnx" => Ok(NerBackend::Onnx),
            other => bail!("NER_BACKEND must be 'http' or 'onnx', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Every field has a default; only malformed values abort startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub upload_dir: PathBuf,
    pub keep_uploads: bool,
    pub max_upload_bytes: usize,
    pub workers: usize,
    pub ner_backend: NerBackend,
    pub ner_model_url: String,
    pub ner_api_token: Option<String>,
    pub ner_model_dir: PathBuf,
    pub ner_max_chars: usize,
    pub doc_converter: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let workers = match std::env::var("PARSER_WORKERS") {
            Ok(v) => v
                .parse::<usize>()
                .context("PARSER_WORKERS must be a positive integer")?,
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };

        let config = Config {
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upload_dir: PathBuf::from(
                std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            ),
            keep_uploads: parse_env("KEEP_UPLOADS", true)
                .context("KEEP_UPLOADS must be 'true' or 'false'")?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            workers,
            ner_backend: std::env::var("NER_BACKEND")
                .unwrap_or_else(|_| "http".to_string())
                .parse()?,
            ner_model_url: std::env::var("NER_MODEL_URL")
                .unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string()),
            ner_api_token: std::env::var("NER_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            ner_model_dir: PathBuf::from(
                std::env::var("NER_MODEL_DIR").unwrap_or_else(|_| "./output/model-best".to_string()),
            ),
            ner_max_chars: parse_env("NER_MAX_CHARS", 2000)
                .context("NER_MAX_CHARS must be a positive integer")?,
            doc_converter: std::env::var("DOC_CONVERTER").unwrap_or_else(|_| "antiword".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("PARSER_WORKERS must be at least 1");
        }
        if self.ner_max_chars < 64 {
            bail!("NER_MAX_CHARS must be at least 64");
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for '{key}': {v}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for unit tests; uploads go to `upload_dir`.
    pub fn for_tests(upload_dir: PathBuf) -> Self {
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            upload_dir,
            keep_uploads: false,
            max_upload_bytes: 1024 * 1024,
            workers: 2,
            ner_backend: NerBackend::Http,
            ner_model_url: "http://127.0.0.1:9/unused".to_string(),
            ner_api_token: None,
            ner_model_dir: PathBuf::from("./output/model-best"),
            ner_max_chars: 2000,
            doc_converter: "antiword-not-installed-for-tests".to_string(),
        }
    }
}
