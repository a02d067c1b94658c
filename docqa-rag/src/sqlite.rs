//! SQLite vector store backend.
//!
//! Provides [`SqliteVectorStore`] which implements [`VectorStore`] using
//! [sqlx](https://docs.rs/sqlx) over a single on-disk SQLite file. Search is
//! a brute-force cosine scan, which is adequate for corpora of a few
//! thousand chunks.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::sqlite::SqliteVectorStore;
//!
//! let store = SqliteVectorStore::open("./index/docqa.db").await?;
//! store.create_collection("docs", "training corpus", 384).await?;
//! store.insert("docs", &records).await?;
//! let nearest = store.search("docs", &query_embedding, 3).await?;
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::document::{IndexedRecord, ScoredRecord};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, cosine_distance, rank};

const BACKEND: &str = "sqlite";

/// A [`VectorStore`] persisted in a SQLite database file.
///
/// Schema: `collections(name, description, dimensions)` and
/// `records(seq, id, collection, text, metadata, embedding)`. Metadata is a
/// JSON object of strings; embeddings are little-endian `f32` blobs.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (creating if missing) the database at `path`.
    ///
    /// Parent directories are created as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(Self::map_err)?;

        let store = Self { pool };
        store.init_schema().await?;
        debug!(path = %path.display(), "opened sqlite vector store");
        Ok(store)
    }

    /// Create a store from an existing connection pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    fn map_err(e: sqlx::Error) -> RagError {
        RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                dimensions INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                collection TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection)")
            .execute(&self.pool)
            .await
            .map_err(Self::map_err)?;

        Ok(())
    }

    async fn dimensions(&self, collection: &str) -> Result<usize> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dimensions FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::map_err)?;
        dims.map(|d| d as usize).ok_or_else(|| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("collection '{collection}' does not exist"),
        })
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow, embedding: Vec<f32>) -> Result<IndexedRecord> {
        let metadata: String = row.get("metadata");
        let metadata: HashMap<String, String> =
            serde_json::from_str(&metadata).map_err(|e| RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("corrupt metadata: {e}"),
            })?;
        Ok(IndexedRecord { id: row.get("id"), embedding, text: row.get("text"), metadata })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(
        &self,
        name: &str,
        description: &str,
        dimensions: usize,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, description, dimensions) VALUES (?1, ?2, ?3)",
        )
        .bind(name)
        .bind(description)
        .bind(dimensions as i64)
        .execute(&self.pool)
        .await
        .map_err(Self::map_err)?;

        debug!(collection = name, dimensions, "ensured sqlite collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        sqlx::query("DELETE FROM records WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        tx.commit().await.map_err(Self::map_err)?;

        debug!(collection = name, "deleted sqlite collection");
        Ok(())
    }

    async fn insert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let dimensions = self.dimensions(collection).await?;
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimensions) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "record '{}' has {} dimensions, collection '{collection}' expects {dimensions}",
                    bad.id,
                    bad.embedding.len()
                ),
            });
        }

        let mut tx = self.pool.begin().await.map_err(Self::map_err)?;
        for record in records {
            let metadata = serde_json::to_string(&record.metadata).map_err(|e| {
                RagError::VectorStoreError { backend: BACKEND.to_string(), message: e.to_string() }
            })?;

            sqlx::query(
                "INSERT INTO records (id, collection, text, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&record.id)
            .bind(collection)
            .bind(&record.text)
            .bind(&metadata)
            .bind(Self::serialize_embedding(&record.embedding))
            .execute(&mut *tx)
            .await
            .map_err(Self::map_err)?;
        }
        tx.commit().await.map_err(Self::map_err)?;

        debug!(collection, count = records.len(), "inserted records into sqlite");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let dimensions = self.dimensions(collection).await?;
        if embedding.len() != dimensions {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has {} dimensions, collection '{collection}' expects {dimensions}",
                    embedding.len()
                ),
            });
        }

        let rows = sqlx::query(
            "SELECT id, text, metadata, embedding FROM records WHERE collection = ?1 ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Vec<u8> = row.get("embedding");
            let stored = Self::deserialize_embedding(&bytes);
            let distance = cosine_distance(&stored, embedding);
            scored.push(ScoredRecord { record: Self::row_to_record(row, Vec::new())?, distance });
        }

        Ok(rank(scored, top_k))
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.dimensions(collection).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::map_err)?;
        Ok(count as usize)
    }

    async fn peek(&self, collection: &str, limit: usize) -> Result<Vec<IndexedRecord>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata FROM records WHERE collection = ?1 ORDER BY seq LIMIT ?2",
        )
        .bind(collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_err)?;

        rows.iter().map(|row| Self::row_to_record(row, Vec::new())).collect()
    }
}
