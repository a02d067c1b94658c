//! Embedding provider trait and the ordered fallback chain.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (the built-in local
/// model, a remote HTTP endpoint) behind a unified async interface. The
/// default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{EmbeddingProvider, HashingEmbeddingProvider};
///
/// let provider = HashingEmbeddingProvider::new(384);
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs and status reports.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Whether vectors from this provider carry no similarity signal.
    fn is_degraded(&self) -> bool {
        false
    }
}

/// Tries a list of providers in order; the first success wins.
///
/// A whole batch is always served by a single provider: if provider `n`
/// fails on any item, the entire batch is retried on provider `n + 1`. This
/// keeps every vector of one insert in the same embedding space.
///
/// # Example
///
/// ```rust,ignore
/// let chain = FallbackEmbeddingProvider::new(vec![remote, local])?;
/// let vectors = chain.embed_batch(&texts).await?;
/// ```
pub struct FallbackEmbeddingProvider {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
}

impl FallbackEmbeddingProvider {
    /// Build a chain from providers in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(RagError::ConfigError(
                "an embedding chain needs at least one provider".to_string(),
            ));
        }
        Ok(Self { providers })
    }

    /// The providers in priority order.
    pub fn providers(&self) -> &[Arc<dyn EmbeddingProvider>] {
        &self.providers
    }

    fn last(&self) -> &Arc<dyn EmbeddingProvider> {
        // `new` guarantees at least one provider.
        &self.providers[self.providers.len() - 1]
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbeddingProvider {
    fn name(&self) -> &str {
        self.providers[0].name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: self.name().to_string(),
            message: "provider returned no vector".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => {
                    debug!(provider = provider.name(), batch_size = texts.len(), "batch embedded");
                    return Ok(vectors);
                }
                Ok(vectors) => {
                    warn!(
                        provider = provider.name(),
                        expected = texts.len(),
                        received = vectors.len(),
                        "provider returned a partial batch, falling back"
                    );
                    last_error = Some(RagError::EmbeddingError {
                        provider: provider.name().to_string(),
                        message: format!("expected {} vectors, got {}", texts.len(), vectors.len()),
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "embedding failed, falling back");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| RagError::EmbeddingError {
            provider: self.last().name().to_string(),
            message: "no provider produced embeddings".to_string(),
        }))
    }

    fn dimensions(&self) -> usize {
        self.providers[0].dimensions()
    }

    fn is_degraded(&self) -> bool {
        self.providers.iter().all(|p| p.is_degraded())
    }
}
