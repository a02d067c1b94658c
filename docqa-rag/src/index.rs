//! Vector index adapter: typed chunks in, ranked matches out.
//!
//! [`VectorIndex`] owns one collection of a [`VectorStore`] and the
//! embedding providers used to fill and query it. It is the only place
//! where [`Chunk`]s cross the string-metadata boundary of the store.
//!
//! Every vector of a collection must come from the same embedding space.
//! Queries always use the local provider; remote embeddings are only
//! appropriate for an index that will be queried by the same remote model,
//! and nothing here detects a mixed index.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, IndexedRecord, RetrievedMatch, keys};
use crate::embedding::{EmbeddingProvider, FallbackEmbeddingProvider};
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// Which embedding path `add` should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingMode {
    /// The local model only.
    #[default]
    Local,
    /// The remote provider when configured, re-embedding the whole batch
    /// locally if it fails.
    PreferRemote,
}

/// Collection statistics reported by [`VectorIndex::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Exact number of stored chunks.
    pub total_chunks: usize,
    /// Number of distinct source files seen in the sample.
    pub unique_sources: usize,
    /// Distinct source files seen in the sample, sorted.
    pub source_files: Vec<String>,
    /// False when the sample did not cover every stored chunk, in which
    /// case `unique_sources` is a lower bound.
    pub sources_exact: bool,
}

/// Adapter over one vector-store collection.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    collection: String,
    description: String,
    local: Arc<dyn EmbeddingProvider>,
    remote: Option<Arc<dyn EmbeddingProvider>>,
    sample_limit: usize,
}

impl VectorIndex {
    /// Create an adapter for `config.collection_name` embedding with `local`.
    pub fn new(
        store: Arc<dyn VectorStore>,
        config: &RagConfig,
        local: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            store,
            collection: config.collection_name.clone(),
            description: config.collection_description.clone(),
            local,
            remote: None,
            sample_limit: config.stats_sample_limit,
        }
    }

    /// Attach a remote embedding provider for [`EmbeddingMode::PreferRemote`].
    pub fn with_remote(mut self, remote: Arc<dyn EmbeddingProvider>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Name of the active collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The local embedding provider (also used for every query).
    pub fn local_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.local
    }

    /// Whether a remote embedding provider is attached.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.store
            .create_collection(&self.collection, &self.description, self.local.dimensions())
            .await
    }

    fn provider_for(&self, mode: EmbeddingMode) -> Result<Arc<dyn EmbeddingProvider>> {
        match (mode, &self.remote) {
            (EmbeddingMode::PreferRemote, Some(remote)) => {
                let providers = vec![Arc::clone(remote), Arc::clone(&self.local)];
                Ok(Arc::new(FallbackEmbeddingProvider::new(providers)?))
            }
            (EmbeddingMode::PreferRemote, None) => {
                warn!("remote embeddings requested without a remote provider, using local");
                Ok(Arc::clone(&self.local))
            }
            (EmbeddingMode::Local, _) => Ok(Arc::clone(&self.local)),
        }
    }

    /// Embed and store `chunks` as one atomic batch.
    ///
    /// Returns the number of records stored.
    ///
    /// # Errors
    ///
    /// Returns the embedding or vector store error if the batch could not
    /// be embedded by any provider or could not be inserted. Nothing is
    /// stored in that case.
    pub async fn add(&self, chunks: &[Chunk], mode: EmbeddingMode) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let provider = self.provider_for(mode)?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = provider.embed_batch(&texts).await?;

        let records: Vec<IndexedRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedRecord::from_chunk(chunk, embedding))
            .collect();

        self.ensure_collection().await?;
        self.store.insert(&self.collection, &records).await?;

        info!(
            collection = %self.collection,
            chunk_count = records.len(),
            provider = provider.name(),
            "indexed chunks"
        );
        Ok(records.len())
    }

    /// Return up to `k` matches for `text`, best first.
    ///
    /// Storage and embedding failures are logged and yield an empty list.
    /// Records whose metadata cannot be decoded are skipped.
    pub async fn query(&self, text: &str, k: usize) -> Vec<RetrievedMatch> {
        if k == 0 {
            return Vec::new();
        }

        let embedding = match self.local.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(error = %e, "failed to embed query");
                return Vec::new();
            }
        };

        let scored = match self.store.search(&self.collection, &embedding, k).await {
            Ok(scored) => scored,
            Err(e) => {
                error!(collection = %self.collection, error = %e, "vector search failed");
                return Vec::new();
            }
        };

        let matches: Vec<RetrievedMatch> = scored
            .into_iter()
            .filter_map(|scored| {
                match Chunk::from_record(scored.record.text, &scored.record.metadata) {
                    Ok(chunk) => {
                        Some(RetrievedMatch { chunk, similarity_score: 1.0 - scored.distance })
                    }
                    Err(e) => {
                        warn!(id = %scored.record.id, error = %e, "skipping undecodable record");
                        None
                    }
                }
            })
            .collect();

        debug!(k, result_count = matches.len(), "query complete");
        matches
    }

    /// Exact chunk count plus source files from a bounded sample.
    ///
    /// At most `stats_sample_limit` records are inspected, so for large
    /// collections `unique_sources` may undercount; `sources_exact` says
    /// whether the sample covered the whole collection.
    pub async fn stats(&self) -> Result<IndexStats> {
        let total_chunks = self.store.count(&self.collection).await?;
        let sample_size = total_chunks.min(self.sample_limit);
        let sample = self.store.peek(&self.collection, sample_size).await?;

        let source_files: BTreeSet<String> = sample
            .into_iter()
            .map(|record| {
                record.metadata.get(keys::SOURCE_FILE).cloned().unwrap_or_else(|| "Unknown".into())
            })
            .collect();

        Ok(IndexStats {
            total_chunks,
            unique_sources: source_files.len(),
            source_files: source_files.into_iter().collect(),
            sources_exact: total_chunks <= sample_size,
        })
    }

    /// Delete every record and recreate the empty collection.
    pub async fn clear(&self) -> Result<()> {
        self.store.delete_collection(&self.collection).await?;
        self.ensure_collection().await?;
        info!(collection = %self.collection, "cleared index");
        Ok(())
    }
}
