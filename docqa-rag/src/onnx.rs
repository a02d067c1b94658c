//! ONNX Runtime embedder for sentence-transformer models such as
//! all-MiniLM-L6-v2.
//!
//! This module is only available when the `onnx` feature is enabled.
//!
//! A model directory holds the exported graph (`model_quantized.onnx` or
//! `model.onnx`) and the HuggingFace `tokenizer.json`:
//!
//! ```text
//! mkdir -p models/all-MiniLM-L6-v2 && cd models/all-MiniLM-L6-v2
//! curl -LO https://huggingface.co/Xenova/all-MiniLM-L6-v2/resolve/main/onnx/model_quantized.onnx
//! curl -LO https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json
//! ```

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::{Array1, Array2};
use ort::{inputs, session::Session, value::Value};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "onnx";

/// Graph files looked up in a model directory, quantized first.
const MODEL_FILES: [&str; 2] = ["model_quantized.onnx", "model.onnx"];
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Sentence-transformers truncates MiniLM input at 256 word pieces.
const MAX_SEQUENCE_LENGTH: usize = 256;

fn err(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.to_string(), message: message.into() }
}

/// Local transformer embeddings: tokenize, run the encoder, mean-pool the
/// last hidden state over the attention mask, then L2-normalize.
///
/// Inference is CPU-bound and serialized through one session.
pub struct OnnxEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model_name: String,
    dimensions: usize,
}

impl OnnxEmbeddingProvider {
    /// Load the model and tokenizer found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if either file is missing or
    /// cannot be loaded.
    pub fn from_dir(dir: &Path, model_name: &str, dimensions: usize) -> Result<Self> {
        let model_path = MODEL_FILES
            .iter()
            .map(|file| dir.join(file))
            .find(|path| path.is_file())
            .ok_or_else(|| err(format!("no {} in {}", MODEL_FILES.join(" or "), dir.display())))?;

        let tokenizer_path = dir.join(TOKENIZER_FILE);
        if !tokenizer_path.is_file() {
            return Err(err(format!("tokenizer not found at {}", tokenizer_path.display())));
        }

        Self::from_paths(&model_path, &tokenizer_path, model_name, dimensions)
    }

    /// Load the model and tokenizer from explicit paths.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if ONNX Runtime rejects the model
    /// or the tokenizer cannot be parsed.
    pub fn from_paths(
        model_path: &Path,
        tokenizer_path: &Path,
        model_name: &str,
        dimensions: usize,
    ) -> Result<Self> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| err(format!("failed to load {}: {e}", model_path.display())))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| err(format!("failed to load tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| err(format!("failed to configure truncation: {e}")))?;

        info!(model = model_name, path = %model_path.display(), dimensions, "loaded ONNX model");
        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| err(format!("tokenization failed: {e}")))?;

        let mask: Vec<i64> = encoding.get_attention_mask().iter().map(|&m| i64::from(m)).collect();
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let shape = (1, ids.len());

        let input_ids = Array2::from_shape_vec(shape, ids)
            .map_err(|e| err(format!("bad input_ids shape: {e}")))?;
        let attention_mask = Array2::from_shape_vec(shape, mask.clone())
            .map_err(|e| err(format!("bad attention_mask shape: {e}")))?;
        let token_type_ids = Array2::<i64>::zeros(shape);

        let hidden_state = {
            let mut session = self.session.lock().map_err(|_| err("session lock poisoned"))?;
            let tensor = |array: Array2<i64>| {
                Value::from_array(array).map_err(|e| err(format!("failed to build tensor: {e}")))
            };
            let outputs = session
                .run(inputs![
                    "input_ids" => tensor(input_ids)?,
                    "attention_mask" => tensor(attention_mask)?,
                    "token_type_ids" => tensor(token_type_ids)?
                ])
                .map_err(|e| err(format!("inference failed: {e}")))?;

            let (shape, data) = outputs["last_hidden_state"]
                .try_extract_tensor::<f32>()
                .map_err(|e| err(format!("missing last_hidden_state: {e}")))?;

            // [batch = 1, tokens, hidden]
            let dims = shape.as_ref();
            if dims.len() != 3 {
                return Err(err(format!("expected a 3-d hidden state, got shape {dims:?}")));
            }
            let (tokens, hidden) = (dims[1] as usize, dims[2] as usize);
            Array2::from_shape_vec((tokens, hidden), data[..tokens * hidden].to_vec())
                .map_err(|e| err(format!("bad hidden state shape: {e}")))?
        };

        if hidden_state.ncols() != self.dimensions {
            return Err(err(format!(
                "{} produced {} dimensions, expected {}",
                self.model_name,
                hidden_state.ncols(),
                self.dimensions
            )));
        }

        Ok(mean_pool_normalized(&hidden_state, &mask))
    }
}

/// Average the token rows selected by `mask`, then scale to unit length.
fn mean_pool_normalized(hidden_state: &Array2<f32>, mask: &[i64]) -> Vec<f32> {
    let mut pooled = Array1::<f32>::zeros(hidden_state.ncols());
    let mut count = 0.0f32;
    for (row, _) in hidden_state.outer_iter().zip(mask).filter(|(_, m)| **m == 1) {
        pooled += &row;
        count += 1.0;
    }
    if count > 0.0 {
        pooled /= count;
    }

    let norm = pooled.dot(&pooled).sqrt();
    if norm > 0.0 {
        pooled /= norm;
    }
    pooled.to_vec()
}

#[async_trait]
impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding text");
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
