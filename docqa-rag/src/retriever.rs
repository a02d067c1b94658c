//! Top-k retrieval over the vector index.

use std::sync::Arc;

use tracing::debug;

use crate::document::RetrievedMatch;
use crate::index::VectorIndex;

/// Upper bound on the default number of matches per question.
pub const DEFAULT_MAX_MATCHES: usize = 3;

/// Fetches the best matches for a question from a [`VectorIndex`].
///
/// Queries are embedded with the index's local provider only, even when a
/// remote provider is attached, so query vectors and stored vectors share
/// one embedding space.
pub struct Retriever {
    index: Arc<VectorIndex>,
    default_k: usize,
}

impl Retriever {
    /// Create a retriever whose default `k` is `min(3, top_k)`.
    pub fn new(index: Arc<VectorIndex>, top_k: usize) -> Self {
        Self { index, default_k: top_k.min(DEFAULT_MAX_MATCHES) }
    }

    /// The `k` used by [`retrieve_default`](Self::retrieve_default).
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// The index this retriever reads from.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Return up to `k` matches, best first. Never fails; an empty or
    /// unavailable index yields an empty list.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<RetrievedMatch> {
        let matches = self.index.query(query, k).await;
        debug!(k, found = matches.len(), "retrieved matches");
        matches
    }

    /// [`retrieve`](Self::retrieve) with the default `k`.
    pub async fn retrieve_default(&self, query: &str) -> Vec<RetrievedMatch> {
        self.retrieve(query, self.default_k).await
    }
}
