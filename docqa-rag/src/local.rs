//! Local embedding models.
//!
//! The default local model is all-MiniLM-L6-v2, run through ONNX Runtime by
//! [`OnnxEmbeddingProvider`](crate::onnx::OnnxEmbeddingProvider) when the
//! `onnx` feature is enabled and the model files are present.
//! `hashing-bow` is a deterministic feature-hashing embedder for tests and
//! offline development. When the configured model cannot be loaded,
//! [`LocalModel::load`] substitutes [`ZeroEmbeddingProvider`] so ingestion
//! and retrieval keep running in a detectable degraded mode.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// Name of the default local model.
pub const DEFAULT_LOCAL_MODEL: &str = "all-MiniLM-L6-v2";

/// Output width of all-MiniLM-L6-v2.
pub const MINILM_DIMENSIONS: usize = 384;

/// Directory searched for the default model's files.
pub const DEFAULT_MODEL_DIR: &str = "./models/all-MiniLM-L6-v2";

/// Name of the feature-hashing development model.
pub const HASHING_MODEL: &str = "hashing-bow";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets with a hash-derived sign; the resulting vector is
/// L2-normalized. Text without tokens embeds to the zero vector.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    /// Create an embedder producing `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    fn name(&self) -> &str {
        HASHING_MODEL
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Degraded substitute returning zero vectors of a fixed dimension.
///
/// Every stored record ends up equidistant from every query, so ranking is
/// meaningless. [`is_degraded`](EmbeddingProvider::is_degraded) reports this
/// to the status endpoint.
#[derive(Debug, Clone, Copy)]
pub struct ZeroEmbeddingProvider {
    dimensions: usize,
}

impl ZeroEmbeddingProvider {
    /// Create a provider producing `dimensions`-long zero vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for ZeroEmbeddingProvider {
    fn name(&self) -> &str {
        "zero"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_degraded(&self) -> bool {
        true
    }
}

/// Family of a configured local model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalModelKind {
    /// all-MiniLM-L6-v2, with or without the `sentence-transformers/` prefix.
    MiniLm,
    /// The feature-hashing development model.
    Hashing,
    /// Anything else.
    Unknown,
}

impl LocalModelKind {
    /// Classify `name`. A blank name means the default model.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        let base = name.rsplit('/').next().unwrap_or(name);
        if name.is_empty() || base.eq_ignore_ascii_case(DEFAULT_LOCAL_MODEL) {
            Self::MiniLm
        } else if base == HASHING_MODEL {
            Self::Hashing
        } else {
            Self::Unknown
        }
    }
}

/// Resolves the configured local embedding model.
pub struct LocalModel;

impl LocalModel {
    /// Load the local model called `name` from [`DEFAULT_MODEL_DIR`].
    pub fn load(name: &str, dimensions: usize) -> Arc<dyn EmbeddingProvider> {
        Self::load_from(name, dimensions, Path::new(DEFAULT_MODEL_DIR))
    }

    /// Load the local model called `name`, reading model files from
    /// `model_dir`.
    ///
    /// Unknown names, missing model files and a dimension the model cannot
    /// produce all fall back to [`ZeroEmbeddingProvider`] with a warning
    /// instead of failing.
    pub fn load_from(
        name: &str,
        dimensions: usize,
        model_dir: &Path,
    ) -> Arc<dyn EmbeddingProvider> {
        match LocalModelKind::from_name(name) {
            LocalModelKind::Hashing => Arc::new(HashingEmbeddingProvider::new(dimensions)),
            LocalModelKind::MiniLm if dimensions != MINILM_DIMENSIONS => {
                warn!(
                    model = name,
                    dimensions,
                    expected = MINILM_DIMENSIONS,
                    "model cannot produce the configured dimensions, using zero vectors"
                );
                Self::degraded(dimensions)
            }
            LocalModelKind::MiniLm => Self::minilm(name, dimensions, model_dir),
            LocalModelKind::Unknown => {
                warn!(model = name, dimensions, "unknown local model, using zero vectors");
                Self::degraded(dimensions)
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn minilm(name: &str, dimensions: usize, model_dir: &Path) -> Arc<dyn EmbeddingProvider> {
        use crate::onnx::OnnxEmbeddingProvider;

        match OnnxEmbeddingProvider::from_dir(model_dir, DEFAULT_LOCAL_MODEL, dimensions) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                warn!(
                    model = name,
                    dir = %model_dir.display(),
                    error = %e,
                    "local embedding model unavailable, using zero vectors"
                );
                Self::degraded(dimensions)
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn minilm(name: &str, dimensions: usize, model_dir: &Path) -> Arc<dyn EmbeddingProvider> {
        warn!(
            model = name,
            dir = %model_dir.display(),
            "built without the onnx feature, using zero vectors"
        );
        Self::degraded(dimensions)
    }

    fn degraded(dimensions: usize) -> Arc<dyn EmbeddingProvider> {
        Arc::new(ZeroEmbeddingProvider::new(dimensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn hashing_is_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(384);
        let a = provider.embed("Fire evacuation route").await.unwrap();
        let b = provider.embed("fire EVACUATION route").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_vocabulary_scores_higher() {
        let provider = HashingEmbeddingProvider::new(384);
        let query = provider.embed("fire alarm").await.unwrap();
        let related =
            provider.embed("when the fire alarm sounds leave the building").await.unwrap();
        let unrelated = provider.embed("quiet hours begin at ten").await.unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn text_without_tokens_is_zero() {
        let provider = HashingEmbeddingProvider::new(8);
        assert_eq!(provider.embed(" ... ").await.unwrap(), vec![0.0; 8]);
    }

    #[test]
    fn model_names_are_classified() {
        assert_eq!(LocalModelKind::from_name("all-MiniLM-L6-v2"), LocalModelKind::MiniLm);
        assert_eq!(
            LocalModelKind::from_name("sentence-transformers/all-minilm-l6-v2"),
            LocalModelKind::MiniLm
        );
        assert_eq!(LocalModelKind::from_name("  "), LocalModelKind::MiniLm);
        assert_eq!(LocalModelKind::from_name(HASHING_MODEL), LocalModelKind::Hashing);
        assert_eq!(LocalModelKind::from_name("bge-small"), LocalModelKind::Unknown);
    }

    #[test]
    fn unknown_model_degrades_to_zero_vectors() {
        let provider = LocalModel::load("bge-small", 384);
        assert!(provider.is_degraded());
        assert_eq!(provider.dimensions(), 384);

        let hashing = LocalModel::load(HASHING_MODEL, 64);
        assert!(!hashing.is_degraded());
        assert_eq!(hashing.name(), HASHING_MODEL);
    }

    #[test]
    fn minilm_without_model_files_degrades() {
        let empty = tempfile::tempdir().unwrap();
        let provider =
            LocalModel::load_from(DEFAULT_LOCAL_MODEL, MINILM_DIMENSIONS, empty.path());
        assert!(provider.is_degraded());
        assert_eq!(provider.dimensions(), MINILM_DIMENSIONS);
    }

    #[test]
    fn minilm_with_wrong_dimensions_degrades() {
        let provider = LocalModel::load(DEFAULT_LOCAL_MODEL, 768);
        assert!(provider.is_degraded());
        assert_eq!(provider.dimensions(), 768);
    }
}
