//! Data types for pages, chunks, stored records and answers.
//!
//! The vector store only accepts flat string metadata, so [`Chunk`] crosses
//! the storage boundary through an explicit codec:
//! [`Chunk::to_metadata`] flattens it and [`Chunk::from_record`] parses it
//! back. Business logic never touches the flattened map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Metadata keys written by [`Chunk::to_metadata`].
pub mod keys {
    /// Source filename.
    pub const SOURCE_FILE: &str = "source_file";
    /// Human-readable document title.
    pub const DOCUMENT_TITLE: &str = "document_title";
    /// 1-based page number, decimal string.
    pub const PAGE_NUMBER: &str = "page_number";
    /// Link to the original document.
    pub const DOCUMENT_LINK: &str = "document_link";
    /// 0-based chunk ordinal within its page, decimal string.
    pub const CHUNK_INDEX: &str = "chunk_index";
    /// Number of words in the chunk text, decimal string.
    pub const WORD_COUNT: &str = "word_count";
}

/// Text of one extracted document page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Page text as extracted (not yet normalized).
    pub text: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Filename the page was extracted from.
    pub source_file: String,
    /// Number of pages in the source document.
    pub total_pages: u32,
}

/// Document-level metadata shared by every chunk of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    /// Filename the page came from.
    pub source_file: String,
    /// Human-readable document title.
    pub document_title: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Link to the original document.
    pub document_link: String,
}

/// A bounded, overlapping word window of one page: the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text (words joined by single spaces).
    pub text: String,
    /// Filename the chunk came from.
    pub source_file: String,
    /// Human-readable document title.
    pub document_title: String,
    /// 1-based page number.
    pub page_number: u32,
    /// Link to the original document.
    pub document_link: String,
    /// Ordinal of the chunk within its page.
    pub chunk_index: usize,
    /// Number of whitespace-delimited words in `text`.
    pub word_count: usize,
}

impl Chunk {
    /// Citation label in the `"Title (Page N)"` form.
    pub fn citation(&self) -> String {
        format!("{} (Page {})", self.document_title, self.page_number)
    }

    /// Flatten into the string map persisted by the vector store.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            (keys::SOURCE_FILE.to_string(), self.source_file.clone()),
            (keys::DOCUMENT_TITLE.to_string(), self.document_title.clone()),
            (keys::PAGE_NUMBER.to_string(), self.page_number.to_string()),
            (keys::DOCUMENT_LINK.to_string(), self.document_link.clone()),
            (keys::CHUNK_INDEX.to_string(), self.chunk_index.to_string()),
            (keys::WORD_COUNT.to_string(), self.word_count.to_string()),
        ])
    }

    /// Rebuild a chunk from stored text and flattened metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MetadataError`] if a key is missing or a numeric
    /// field does not parse.
    pub fn from_record(
        text: impl Into<String>,
        metadata: &HashMap<String, String>,
    ) -> Result<Self> {
        Ok(Self {
            text: text.into(),
            source_file: required(metadata, keys::SOURCE_FILE)?.to_string(),
            document_title: required(metadata, keys::DOCUMENT_TITLE)?.to_string(),
            page_number: numeric(metadata, keys::PAGE_NUMBER)?,
            document_link: required(metadata, keys::DOCUMENT_LINK)?.to_string(),
            chunk_index: numeric(metadata, keys::CHUNK_INDEX)?,
            word_count: numeric(metadata, keys::WORD_COUNT)?,
        })
    }
}

fn required<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    metadata.get(key).map(String::as_str).ok_or_else(|| RagError::MetadataError {
        field: key.to_string(),
        message: "missing".to_string(),
    })
}

fn numeric<T>(metadata: &HashMap<String, String>, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required(metadata, key)?;
    raw.trim().parse().map_err(|e| RagError::MetadataError {
        field: key.to_string(),
        message: format!("{raw:?} is not a number: {e}"),
    })
}

/// A persisted chunk: id, embedding, text and flattened metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// Opaque unique identifier.
    pub id: String,
    /// Embedding vector for `text`.
    pub embedding: Vec<f32>,
    /// Chunk text.
    pub text: String,
    /// String-coerced chunk metadata.
    pub metadata: HashMap<String, String>,
}

impl IndexedRecord {
    /// Build a record for `chunk` with a fresh id.
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            embedding,
            text: chunk.text.clone(),
            metadata: chunk.to_metadata(),
        }
    }
}

/// A stored record paired with its raw distance from a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// The stored record. The embedding may be omitted by the backend.
    pub record: IndexedRecord,
    /// Distance from the query (lower is closer).
    pub distance: f32,
}

/// A chunk returned for a query, with `similarity_score = 1 - distance`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedMatch {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Similarity derived from the store's distance. Not clamped.
    pub similarity_score: f32,
}

/// The answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// Answer text (LLM output or fallback rendering).
    pub answer: String,
    /// Distinct `"Title (Page N)"` citations in retrieval order.
    pub sources: Vec<String>,
    /// Distinct document links in retrieval order.
    pub links: Vec<String>,
    /// Mean similarity of the retrieved matches; 0.0 when none were found.
    pub confidence: f32,
    /// Number of matches the answer was built from.
    pub retrieved_docs_count: usize,
}
