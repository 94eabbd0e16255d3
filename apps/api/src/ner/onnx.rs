use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::Session;
use serde::Deserialize;
use tokenizers::{Encoding, Tokenizer, TruncationParams};

use super::bio::{aggregate, TokenPrediction};
use super::{Entity, EntityRecognizer, NerError};

/// Token limit of BERT-family encoders.
const MAX_TOKENS: usize = 512;
/// Tokens shared between consecutive overflow chunks so entities cut at a
/// chunk edge are seen whole in the next chunk.
const OVERFLOW_STRIDE: usize = 64;

#[derive(Debug, Deserialize)]
struct ModelConfig {
    id2label: HashMap<String, String>,
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
}

/// Local token-classification model run through ONNX Runtime.
///
/// `model_dir` must contain `model.onnx` (inputs: input_ids, attention_mask,
/// token_type_ids; output: logits `[1, seq_len, num_labels]`),
/// `tokenizer.json` and the HuggingFace `config.json` carrying `id2label`.
#[derive(Clone)]
pub struct OnnxRecognizer {
    model: Arc<OnnxModel>,
    name: String,
}

impl OnnxRecognizer {
    pub fn load(model_dir: &Path) -> Result<Self, NerError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        for path in [&model_path, &tokenizer_path, &config_path] {
            if !path.exists() {
                return Err(NerError::ModelLoad(format!("{} not found", path.display())));
            }
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| NerError::ModelLoad(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| NerError::ModelLoad(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| NerError::ModelLoad(format!("ONNX load failed: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| NerError::ModelLoad(format!("Tokenizer load failed: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                stride: OVERFLOW_STRIDE,
                ..Default::default()
            }))
            .map_err(|e| NerError::ModelLoad(format!("Tokenizer truncation: {e}")))?;

        let config: ModelConfig = serde_json::from_slice(&std::fs::read(&config_path).map_err(
            |e| NerError::ModelLoad(format!("{}: {e}", config_path.display())),
        )?)?;
        let labels = labels_by_id(config.id2label)?;

        tracing::info!(
            "ONNX NER model loaded from {} ({} labels)",
            model_dir.display(),
            labels.len()
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                labels,
            }),
            name: format!("local ONNX model ({})", model_dir.display()),
        })
    }
}

/// Orders `id2label` by numeric id; ids must be contiguous from 0.
fn labels_by_id(id2label: HashMap<String, String>) -> Result<Vec<String>, NerError> {
    let mut pairs = id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| NerError::ModelLoad(format!("id2label key '{id}' is not an integer")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    pairs.sort_by_key(|(id, _)| *id);

    if pairs.iter().enumerate().any(|(i, (id, _))| i != *id) {
        return Err(NerError::ModelLoad("id2label ids are not contiguous".to_string()));
    }
    Ok(pairs.into_iter().map(|(_, label)| label).collect())
}

impl OnnxModel {
    /// Tokenizes `text`, runs the model over every chunk of at most
    /// `MAX_TOKENS` tokens and returns one prediction per token of `text`.
    fn predict(&self, text: &str) -> Result<Vec<TokenPrediction>, NerError> {
        let mut encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| NerError::Inference(format!("Tokenization: {e}")))?;

        let overflowing = encoding.take_overflowing();
        if !overflowing.is_empty() {
            tracing::debug!(
                "Input exceeds {MAX_TOKENS} tokens; running {} overflow chunk(s)",
                overflowing.len()
            );
        }

        let mut chunks = Vec::with_capacity(1 + overflowing.len());
        chunks.push(self.predict_encoding(&encoding)?);
        for chunk in &overflowing {
            chunks.push(self.predict_encoding(chunk)?);
        }
        Ok(merge_chunks(chunks))
    }

    fn predict_encoding(&self, encoding: &Encoding) -> Result<Vec<TokenPrediction>, NerError> {
        use ort::value::TensorRef;

        let to_i64 = |v: &[u32]| v.iter().map(|&x| x as i64).collect::<Vec<i64>>();
        let input_ids = to_i64(encoding.get_ids());
        let attention_mask = to_i64(encoding.get_attention_mask());
        let token_type_ids = to_i64(encoding.get_type_ids());
        let seq_len = input_ids.len();

        let shape = |v: Vec<i64>| {
            ndarray::Array2::from_shape_vec((1, seq_len), v)
                .map_err(|e| NerError::Inference(e.to_string()))
        };
        let ids_array = shape(input_ids)?;
        let mask_array = shape(attention_mask)?;
        let type_array = shape(token_type_ids)?;

        let ids_tensor = TensorRef::from_array_view(&ids_array)
            .map_err(|e| NerError::Inference(e.to_string()))?;
        let mask_tensor = TensorRef::from_array_view(&mask_array)
            .map_err(|e| NerError::Inference(e.to_string()))?;
        let type_tensor = TensorRef::from_array_view(&type_array)
            .map_err(|e| NerError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| NerError::Inference("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
            .map_err(|e| NerError::Inference(format!("ONNX inference failed: {e}")))?;

        let (out_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| NerError::Inference(format!("Output extraction: {e}")))?;

        let num_labels = self.labels.len();
        if out_shape.len() != 3 || out_shape[1] as usize != seq_len || out_shape[2] as usize != num_labels {
            return Err(NerError::Inference(format!(
                "Unexpected output shape: {out_shape:?}, expected [1, {seq_len}, {num_labels}]"
            )));
        }

        let offsets = encoding.get_offsets();
        let predictions = (0..seq_len)
            .map(|i| {
                let row = &logits[i * num_labels..(i + 1) * num_labels];
                let (label_idx, score) = softmax_argmax(row);
                let (start, end) = offsets[i];
                TokenPrediction {
                    label: self.labels[label_idx].clone(),
                    score,
                    start,
                    end,
                }
            })
            .collect();

        Ok(predictions)
    }
}

/// Joins per-chunk predictions into one token sequence. Chunks overlap by
/// `OVERFLOW_STRIDE` tokens; a token is kept from the first chunk covering it.
/// Special tokens (`start == end`) are dropped.
fn merge_chunks(chunks: Vec<Vec<TokenPrediction>>) -> Vec<TokenPrediction> {
    let mut merged = Vec::new();
    let mut covered_until = 0;
    for token in chunks.into_iter().flatten() {
        if token.start < token.end && token.start >= covered_until {
            covered_until = token.end;
            merged.push(token);
        }
    }
    merged
}

/// Index and probability of the most likely label.
fn softmax_argmax(logits: &[f32]) -> (usize, f32) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|l| (l - max).exp()).sum();
    let (idx, best) = logits
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |acc, (i, l)| if l > acc.1 { (i, l) } else { acc });
    (idx, (best - max).exp() / sum)
}

#[async_trait]
impl EntityRecognizer for OnnxRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recognize(&self, text: &str) -> Result<Vec<Entity>, NerError> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();

        // CPU-bound inference stays off the async runtime.
        tokio::task::spawn_blocking(move || {
            let tokens = model.predict(&text)?;
            Ok(aggregate(&text, &tokens))
        })
        .await
        .map_err(|e| NerError::Inference(format!("Inference task failed: {e}")))?
    }
}
