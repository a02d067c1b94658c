//! In-memory vector store using cosine distance.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free vector
//! store backed by a `HashMap` protected by a `tokio::sync::RwLock`. It is
//! suitable for development, testing, and ephemeral indexes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexedRecord, ScoredRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, cosine_distance, rank};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Collection {
    dimensions: usize,
    // Insertion order is kept so `peek` is stable.
    records: Vec<IndexedRecord>,
}

/// An in-memory vector store using cosine distance for search.
///
/// Collections are stored as collection name → ordered record list.
/// Inserts take the write lock once, so a batch is atomic with respect to
/// concurrent readers.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(
        &self,
        name: &str,
        _description: &str,
        dimensions: usize,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, records: Vec::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn insert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != store.dimensions) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "record '{}' has {} dimensions, collection '{collection}' expects {}",
                    bad.id,
                    bad.embedding.len(),
                    store.dimensions
                ),
            });
        }

        store.records.extend_from_slice(records);
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;

        if embedding.len() != store.dimensions {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has {} dimensions, collection '{collection}' expects {}",
                    embedding.len(),
                    store.dimensions
                ),
            });
        }

        let scored = store
            .records
            .iter()
            .map(|record| ScoredRecord {
                distance: cosine_distance(&record.embedding, embedding),
                record: record.clone(),
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).ok_or_else(|| missing(collection))?.records.len())
    }

    async fn peek(&self, collection: &str, limit: usize) -> Result<Vec<IndexedRecord>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(store
            .records
            .iter()
            .take(limit)
            .map(|r| IndexedRecord { embedding: Vec::new(), ..r.clone() })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn record(id: &str, embedding: Vec<f32>) -> IndexedRecord {
        let metadata = HashMap::new();
        IndexedRecord { id: id.to_string(), embedding, text: id.to_string(), metadata }
    }

    #[tokio::test]
    async fn search_orders_by_ascending_distance() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", "", 2).await.unwrap();
        let records = [
            record("far", vec![-1.0, 0.0]),
            record("near", vec![1.0, 0.1]),
            record("mid", vec![0.0, 1.0]),
        ];
        store.insert("c", &records).await.unwrap();

        let results = store.search("c", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, ["near", "mid"]);
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejects_whole_batch() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", "", 2).await.unwrap();
        let batch = [record("ok", vec![1.0, 0.0]), record("bad", vec![1.0])];
        assert!(store.insert("c", &batch).await.is_err());
        assert_eq!(store.count("c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_an_error() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", "", 2).await.unwrap();
        store.insert("c", &[record("a", vec![1.0, 0.0])]).await.unwrap();

        let err = store.search("c", &[1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));
        assert_eq!(store.search("c", &[1.0, 0.0], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn peek_is_bounded_and_strips_embeddings() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", "", 1).await.unwrap();
        let records: Vec<_> = (0..5).map(|i| record(&format!("r{i}"), vec![1.0])).collect();
        store.insert("c", &records).await.unwrap();

        let peeked = store.peek("c", 3).await.unwrap();
        assert_eq!(peeked.len(), 3);
        assert_eq!(peeked[0].id, "r0");
        assert!(peeked.iter().all(|r| r.embedding.is_empty()));
    }

    #[tokio::test]
    async fn delete_then_create_yields_empty_collection() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", "", 1).await.unwrap();
        store.insert("c", &[record("a", vec![1.0])]).await.unwrap();
        store.delete_collection("c").await.unwrap();
        assert!(store.count("c").await.is_err());
        store.create_collection("c", "", 1).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
    }
}
