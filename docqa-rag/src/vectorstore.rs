//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{IndexedRecord, ScoredRecord};
use crate::error::Result;

/// A storage backend for vector embeddings with nearest-neighbour search.
///
/// Implementations manage named collections of [`IndexedRecord`]s. Records
/// are never mutated after insertion; they disappear only when their
/// collection is deleted.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", "training corpus", 384).await?;
/// store.insert("docs", &records).await?;
/// let nearest = store.search("docs", &query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend identifier used in errors and logs.
    fn backend(&self) -> &str;

    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, description: &str, dimensions: usize)
    -> Result<()>;

    /// Delete a named collection and all its records.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert records as one atomic batch: either all are stored or none.
    async fn insert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()>;

    /// Return the `top_k` records nearest to `embedding`.
    ///
    /// Results are ordered by ascending cosine distance (best match first).
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Exact number of records in the collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Up to `limit` records in insertion order, without embeddings.
    async fn peek(&self, collection: &str, limit: usize) -> Result<Vec<IndexedRecord>>;
}

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// Returns 1.0 (orthogonal) if either vector has zero magnitude or the
/// lengths differ.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / denom
}

/// Sort by ascending distance and keep the first `top_k`.
pub(crate) fn rank(mut scored: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        assert!(cosine_distance(&[1.0, 2.0], &[2.0, 4.0]).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_have_distance_two() {
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_orthogonal_to_everything() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }
}
