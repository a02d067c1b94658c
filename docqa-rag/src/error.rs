//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur in RAG operations.
///
/// Only ingestion and administrative operations surface these to callers.
/// The query path ([`RagEngine::answer`](crate::RagEngine::answer)) converts
/// every variant into a degraded but well-formed answer.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred calling the completion service.
    #[error("Completion error ({provider}): {message}")]
    CompletionError {
        /// The completion provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A page extractor could not read a source file.
    #[error("Extraction error ({path}): {message}")]
    ExtractionError {
        /// The file that failed to extract.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// Stored metadata could not be decoded back into a typed chunk.
    #[error("Metadata error ({field}): {message}")]
    MetadataError {
        /// The metadata key that was missing or malformed.
        field: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingestion was aborted before the index was touched.
    #[error("Ingest error: {0}")]
    IngestError(String),

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// An I/O error from the local filesystem.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
