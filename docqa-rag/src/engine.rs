//! RAG orchestrator.
//!
//! [`RagEngine`] runs one question through retrieve → assemble →
//! synthesize and packages the result with de-duplicated citations and a
//! confidence score. It never returns an error from the query path.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{LocalModel, RagEngine, VectorIndex};
//!
//! let local = LocalModel::load("all-MiniLM-L6-v2", 384);
//! let index = Arc::new(VectorIndex::new(store, &config, local));
//! let engine = RagEngine::builder().config(config).index(index).build()?;
//!
//! let result = engine.answer("What do I do when the fire alarm sounds?").await;
//! println!("{} ({:.2})", result.answer, result.confidence);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::completion::CompletionProvider;
use crate::config::{PersonaConfig, RagConfig};
use crate::context::assemble;
use crate::document::{AnswerResult, Chunk, RetrievedMatch};
use crate::error::{RagError, Result};
use crate::index::{EmbeddingMode, VectorIndex};
use crate::loader::{DocumentLoader, IngestReport};
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;

/// Answer text returned when retrieval finds nothing, for the default
/// persona. See [`no_information_answer`].
pub const NO_INFORMATION_ANSWER: &str = "I couldn't find relevant information in the training \
     documents for your query. Please try rephrasing your question or contact your supervisor.";

/// Answer text returned when retrieval finds nothing in `corpus_name`.
pub fn no_information_answer(corpus_name: &str) -> String {
    format!(
        "I couldn't find relevant information in the {corpus_name} for your query. \
         Please try rephrasing your question or contact your supervisor."
    )
}

/// Health summary of the index and providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    /// `"healthy"` when the index holds chunks, `"empty"` otherwise.
    pub vector_store_status: String,
    /// Exact number of stored chunks.
    pub total_documents: usize,
    /// Distinct source files seen in the stats sample.
    pub source_files: Vec<String>,
    /// Number of entries in `source_files`.
    pub unique_sources: usize,
    /// Whether the sample covered every stored chunk.
    pub sources_exact: bool,
    /// Whether a remote provider credential is configured.
    pub remote_configured: bool,
    /// Name of the embedding model used for queries.
    pub embedding_method: String,
    /// True when query embeddings carry no similarity signal.
    pub embedding_degraded: bool,
    /// Whether LLM answers are enabled.
    pub completion_configured: bool,
}

/// Outcome of an ingestion or rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Per-file extraction report.
    pub report: IngestReport,
    /// Number of records written to the index.
    pub stored: usize,
}

/// The question-answering orchestrator.
///
/// Owns the retriever (and through it the long-lived index) and the
/// synthesizer. Construct one per process via [`RagEngine::builder()`].
pub struct RagEngine {
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    no_information: String,
    remote_configured: bool,
}

impl RagEngine {
    /// Create a new [`RagEngineBuilder`].
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    /// The vector index behind this engine.
    pub fn index(&self) -> &Arc<VectorIndex> {
        self.retriever.index()
    }

    /// The retriever used by [`answer`](Self::answer).
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `query` from the indexed corpus.
    ///
    /// With no matches this returns [`no_information_answer`] with zero
    /// confidence. Otherwise `sources` and `links` list each distinct value
    /// once, in retrieval order, and `confidence` is the mean similarity.
    pub async fn answer(&self, query: &str) -> AnswerResult {
        info!(query_len = query.len(), "processing query");

        let matches = self.retriever.retrieve_default(query).await;
        if matches.is_empty() {
            return AnswerResult {
                answer: self.no_information.clone(),
                sources: Vec::new(),
                links: Vec::new(),
                confidence: 0.0,
                retrieved_docs_count: 0,
            };
        }

        let context = assemble(&matches);
        let answer = self.synthesizer.synthesize(query, &context, &matches).await;

        let sources = dedup(matches.iter().map(|m| m.chunk.citation()));
        let links = dedup(matches.iter().map(|m| m.chunk.document_link.clone()));
        let confidence = mean_similarity(&matches);

        info!(retrieved = matches.len(), confidence, "query answered");
        AnswerResult { answer, sources, links, confidence, retrieved_docs_count: matches.len() }
    }

    /// Report index health. Storage failures are logged and reported as an
    /// empty index.
    pub async fn status(&self) -> SystemStatus {
        let index = self.index();
        let stats = match index.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                error!(error = %e, "failed to read index statistics");
                None
            }
        };
        let (total, files, exact) = match stats {
            Some(s) => (s.total_chunks, s.source_files, s.sources_exact),
            None => (0, Vec::new(), true),
        };

        SystemStatus {
            vector_store_status: if total > 0 { "healthy" } else { "empty" }.to_string(),
            total_documents: total,
            unique_sources: files.len(),
            source_files: files,
            sources_exact: exact,
            remote_configured: self.remote_configured,
            embedding_method: index.local_provider().name().to_string(),
            embedding_degraded: index.local_provider().is_degraded(),
            completion_configured: self.synthesizer.has_completion(),
        }
    }

    /// Load documents and add them to the index without clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] if the source directory is missing
    /// or yields no chunks; the index is not touched in that case. Embedding
    /// and storage errors are returned as-is.
    pub async fn ingest(
        &self,
        loader: &DocumentLoader,
        mode: EmbeddingMode,
    ) -> Result<IngestSummary> {
        let (chunks, report) = Self::load_documents(loader)?;
        self.ingest_chunks(&chunks, report, mode).await
    }

    /// Replace the index contents with freshly loaded documents.
    ///
    /// Documents are loaded before the index is cleared, so a missing or
    /// empty source directory leaves the current index intact. Queries
    /// running concurrently with a rebuild may see a partially filled index.
    ///
    /// # Errors
    ///
    /// As for [`ingest`](Self::ingest).
    pub async fn rebuild(
        &self,
        loader: &DocumentLoader,
        mode: EmbeddingMode,
    ) -> Result<IngestSummary> {
        let (chunks, report) = Self::load_documents(loader)?;
        self.rebuild_from_chunks(&chunks, report, mode).await
    }

    /// Run `loader` and require at least one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestError`] for a missing directory, a directory
    /// without supported files, or documents that yield no text.
    pub fn load_documents(loader: &DocumentLoader) -> Result<(Vec<Chunk>, IngestReport)> {
        let (chunks, report) = loader.load()?;
        if chunks.is_empty() {
            return Err(RagError::IngestError(format!(
                "no text could be extracted from the documents in {}",
                loader.dir().display()
            )));
        }
        Ok((chunks, report))
    }

    /// Add already loaded `chunks` to the index.
    pub async fn ingest_chunks(
        &self,
        chunks: &[Chunk],
        report: IngestReport,
        mode: EmbeddingMode,
    ) -> Result<IngestSummary> {
        let stored = self.index().add(chunks, mode).await?;
        Ok(IngestSummary { report, stored })
    }

    /// Clear the index, then add already loaded `chunks`.
    pub async fn rebuild_from_chunks(
        &self,
        chunks: &[Chunk],
        report: IngestReport,
        mode: EmbeddingMode,
    ) -> Result<IngestSummary> {
        self.index().clear().await?;
        let stored = self.index().add(chunks, mode).await?;
        info!(stored, "index rebuilt");
        Ok(IngestSummary { report, stored })
    }
}

/// Keep the first occurrence of each value, preserving order.
fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values.filter(|v| seen.insert(v.clone())).collect()
}

fn mean_similarity(matches: &[RetrievedMatch]) -> f32 {
    if matches.is_empty() {
        return 0.0;
    }
    matches.iter().map(|m| m.similarity_score).sum::<f32>() / matches.len() as f32
}

/// Builder for constructing a [`RagEngine`].
#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    persona: Option<PersonaConfig>,
    index: Option<Arc<VectorIndex>>,
    completion: Option<Arc<dyn CompletionProvider>>,
    remote_configured: bool,
}

impl RagEngineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the assistant persona. Defaults to [`PersonaConfig::default`].
    pub fn persona(mut self, persona: PersonaConfig) -> Self {
        self.persona = Some(persona);
        self
    }

    /// Set the vector index (required).
    pub fn index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Enable LLM answers through `provider`.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion = Some(provider);
        self
    }

    /// Record whether a remote credential is configured, for status reports.
    pub fn remote_configured(mut self, configured: bool) -> Self {
        self.remote_configured = configured;
        self
    }

    /// Build the [`RagEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if no index was provided.
    pub fn build(self) -> Result<RagEngine> {
        let index = self
            .index
            .ok_or_else(|| RagError::PipelineError("vector index is required".to_string()))?;
        let config = self.config.unwrap_or_default();
        let persona = self.persona.unwrap_or_default();

        let no_information = no_information_answer(&persona.corpus_name);
        let mut synthesizer = AnswerSynthesizer::new(persona, config.excerpt_chars);
        if let Some(completion) = self.completion {
            synthesizer = synthesizer.with_completion(completion);
        }

        Ok(RagEngine {
            retriever: Retriever::new(index, config.top_k),
            synthesizer,
            no_information,
            remote_configured: self.remote_configured,
        })
    }
}
