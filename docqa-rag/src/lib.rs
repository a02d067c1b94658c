//! # docqa-rag
//!
//! Retrieval-augmented question answering over a folder of procedural
//! documents.
//!
//! ## Overview
//!
//! Documents are split into overlapping word windows, embedded, and stored
//! in a vector index. A question is answered by retrieving the closest
//! chunks, rendering them into a citation-friendly context, and asking a
//! chat-completion service for an answer. Without a completion service (or
//! when it fails) a deterministic summary of the matches is returned
//! instead.
//!
//! - [`WordWindowChunker`] - page text → overlapping [`Chunk`]s
//! - [`VectorIndex`] - embeds and stores chunks; ranked queries and stats
//! - [`Retriever`] - top-k matches with `similarity = 1 - distance`
//! - [`assemble`] - matches → numbered source blocks
//! - [`AnswerSynthesizer`] - LLM answer with a template fallback
//! - [`RagEngine`] - the orchestrator: answer, status, ingest, rebuild
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{
//!     DocumentLoader, EmbeddingMode, InMemoryVectorStore, LocalModel, RagConfig, RagEngine,
//!     VectorIndex, WordWindowChunker,
//! };
//!
//! let config = RagConfig::default();
//! let local = LocalModel::load("all-MiniLM-L6-v2", config.embedding_dimensions);
//! let index = Arc::new(VectorIndex::new(Arc::new(InMemoryVectorStore::new()), &config, local));
//! let engine = RagEngine::builder().config(config.clone()).index(index).build()?;
//!
//! let loader = DocumentLoader::new("./docs", Arc::new(WordWindowChunker::new(500, 50)));
//! engine.rebuild(&loader, EmbeddingMode::Local).await?;
//!
//! let result = engine.answer("Who do I call after a fire alarm?").await;
//! ```
//!
//! ## Features
//!
//! - `openrouter` - remote embeddings and chat completions over HTTP
//! - `sqlite` - persistent [`SqliteVectorStore`](sqlite::SqliteVectorStore)
//! - `pdf` - PDF page extraction
//! - `onnx` - all-MiniLM-L6-v2 embeddings through ONNX Runtime
//! - `full` - all of the above

pub mod chunking;
pub mod completion;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod extract;
pub mod index;
pub mod inmemory;
pub mod loader;
pub mod local;
#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "openrouter")]
pub mod openrouter;
pub mod retriever;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod synthesizer;
pub mod vectorstore;

pub use chunking::{Chunker, WordWindowChunker, normalize_text};
pub use completion::CompletionProvider;
pub use config::{AppConfig, PersonaConfig, ProviderConfig, RagConfig, RagConfigBuilder};
pub use context::{NO_DOCUMENTS_FOUND, assemble};
pub use document::{
    AnswerResult, Chunk, IndexedRecord, PageMetadata, RawPage, RetrievedMatch, ScoredRecord,
};
pub use embedding::{EmbeddingProvider, FallbackEmbeddingProvider};
pub use engine::{
    IngestSummary, NO_INFORMATION_ANSWER, RagEngine, RagEngineBuilder, SystemStatus,
    no_information_answer,
};
pub use error::{RagError, Result};
#[cfg(feature = "pdf")]
pub use extract::PdfExtractor;
pub use extract::{PageExtractor, TextExtractor};
pub use index::{EmbeddingMode, IndexStats, VectorIndex};
pub use inmemory::InMemoryVectorStore;
pub use loader::{DocumentLoader, FileReport, IngestReport, format_title, write_chunks_json};
pub use local::{
    DEFAULT_LOCAL_MODEL, DEFAULT_MODEL_DIR, HashingEmbeddingProvider, LocalModel, LocalModelKind,
    ZeroEmbeddingProvider,
};
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbeddingProvider;
#[cfg(feature = "openrouter")]
pub use openrouter::{OpenRouterCompletionProvider, OpenRouterEmbeddingProvider};
pub use retriever::Retriever;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
pub use synthesizer::{AnswerSynthesizer, Prompt};
pub use vectorstore::VectorStore;
