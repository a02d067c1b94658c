//! Configuration for the RAG pipeline and its collaborators.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default base URL for the OpenAI-compatible remote provider.
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Chunk window size in words.
    pub chunk_size: usize,
    /// Number of words shared by consecutive chunks of one page.
    pub chunk_overlap: usize,
    /// Configured result count. Retrieval uses `min(3, top_k)` by default.
    pub top_k: usize,
    /// Name of the vector store collection holding the corpus.
    pub collection_name: String,
    /// Human-readable description stored alongside the collection.
    pub collection_description: String,
    /// Dimensionality of the local embedding model.
    pub embedding_dimensions: usize,
    /// Maximum number of records inspected when computing source statistics.
    pub stats_sample_limit: usize,
    /// Excerpt length (in characters) used by the fallback answer renderer.
    pub excerpt_chars: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 5,
            collection_name: "training_docs".to_string(),
            collection_description: "Training documents for assistant retrieval".to_string(),
            embedding_dimensions: 384,
            stats_sample_limit: 100,
            excerpt_chars: 200,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the chunk window size in words.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in words.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the configured result count.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the collection name.
    pub fn collection_name(mut self, name: impl Into<String>) -> Self {
        self.config.collection_name = name.into();
        self
    }

    /// Set the collection description.
    pub fn collection_description(mut self, description: impl Into<String>) -> Self {
        self.config.collection_description = description.into();
        self
    }

    /// Set the local embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set the number of records sampled by `stats()`.
    pub fn stats_sample_limit(mut self, limit: usize) -> Self {
        self.config.stats_sample_limit = limit;
        self
    }

    /// Set the fallback excerpt length in characters.
    pub fn excerpt_chars(mut self, chars: usize) -> Self {
        self.config.excerpt_chars = chars;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embedding_dimensions == 0`
    /// - the collection name is blank
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.config.collection_name.trim().is_empty() {
            return Err(RagError::ConfigError("collection_name must not be empty".to_string()));
        }
        Ok(self.config)
    }
}

/// Remote provider settings (OpenAI-compatible embedding and chat endpoints).
///
/// An absent `api_key` is not an error: it selects the local embedding path
/// and the deterministic fallback answer renderer.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Bearer credential for the remote provider.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL; `/embeddings` and `/chat/completions` are appended.
    pub base_url: String,
    /// Remote embedding model. It must return (or accept a request for)
    /// vectors of the collection's dimensionality.
    pub embedding_model: String,
    /// Remote chat-completion model.
    pub completion_model: String,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Completion sampling temperature.
    pub temperature: f32,
    /// Whether ingestion should request remote embeddings.
    pub use_remote_embeddings: bool,
    /// Transport timeout applied to every remote request.
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            embedding_model: "openai/text-embedding-3-small".to_string(),
            completion_model: "deepseek/deepseek-chat-v3-0324:free".to_string(),
            max_tokens: 1000,
            temperature: 0.3,
            use_remote_embeddings: false,
            request_timeout_secs: 60,
        }
    }
}

impl ProviderConfig {
    /// Whether a non-empty remote credential is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("completion_model", &self.completion_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("use_remote_embeddings", &self.use_remote_embeddings)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Assistant persona used in prompts and fallback templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonaConfig {
    /// Display name of the assistant.
    pub assistant_name: String,
    /// Short description of who the assistant serves.
    pub audience: String,
    /// Name of the document collection as users know it.
    pub corpus_name: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            assistant_name: "DocQA".to_string(),
            audience: "staff".to_string(),
            corpus_name: "training documents".to_string(),
        }
    }
}

/// Process-level configuration, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Pipeline parameters.
    pub rag: RagConfig,
    /// Remote provider settings.
    pub providers: ProviderConfig,
    /// Prompt persona.
    pub persona: PersonaConfig,
    /// Location of the persistent vector index.
    pub index_path: PathBuf,
    /// Directory scanned for source documents.
    pub docs_dir: PathBuf,
    /// Name of the local embedding model.
    pub local_model: String,
    /// Directory holding the local model's files.
    pub model_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rag: RagConfig::default(),
            providers: ProviderConfig::default(),
            persona: PersonaConfig::default(),
            index_path: PathBuf::from("./index/docqa.db"),
            docs_dir: PathBuf::from("./docs"),
            local_model: crate::local::DEFAULT_LOCAL_MODEL.to_string(),
            model_dir: PathBuf::from(crate::local::DEFAULT_MODEL_DIR),
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a numeric or boolean variable is
    /// malformed or the resulting [`RagConfig`] fails validation.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut rag = RagConfig::builder()
            .chunk_size(parse_or(&get, "DOCQA_CHUNK_SIZE", defaults.rag.chunk_size)?)
            .chunk_overlap(parse_or(&get, "DOCQA_CHUNK_OVERLAP", defaults.rag.chunk_overlap)?)
            .top_k(parse_or(&get, "DOCQA_TOP_K", defaults.rag.top_k)?)
            .embedding_dimensions(parse_or(
                &get,
                "DOCQA_EMBEDDING_DIMENSIONS",
                defaults.rag.embedding_dimensions,
            )?);
        if let Some(name) = get("DOCQA_COLLECTION") {
            rag = rag.collection_name(name);
        }

        let mut providers =
            ProviderConfig { api_key: get("OPENROUTER_API_KEY"), ..defaults.providers };
        if let Some(url) = get("OPENROUTER_BASE_URL") {
            providers.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("DOCQA_EMBEDDING_MODEL") {
            providers.embedding_model = model;
        }
        if let Some(model) = get("DOCQA_COMPLETION_MODEL") {
            providers.completion_model = model;
        }
        providers.use_remote_embeddings = parse_bool_or(&get, "DOCQA_REMOTE_EMBEDDINGS", false)?;
        providers.request_timeout_secs =
            parse_or(&get, "DOCQA_REQUEST_TIMEOUT_SECS", providers.request_timeout_secs)?;

        let mut persona = defaults.persona;
        if let Some(name) = get("DOCQA_ASSISTANT_NAME") {
            persona.assistant_name = name;
        }
        if let Some(audience) = get("DOCQA_AUDIENCE") {
            persona.audience = audience;
        }
        if let Some(corpus) = get("DOCQA_CORPUS_NAME") {
            persona.corpus_name = corpus;
        }

        Ok(Self {
            rag: rag.build()?,
            providers,
            persona,
            index_path: get("DOCQA_INDEX_PATH").map(PathBuf::from).unwrap_or(defaults.index_path),
            docs_dir: get("DOCQA_DOCS_DIR").map(PathBuf::from).unwrap_or(defaults.docs_dir),
            local_model: get("DOCQA_LOCAL_MODEL").unwrap_or(defaults.local_model),
            model_dir: get("DOCQA_MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model_dir),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| RagError::ConfigError(format!("{key}={raw:?} is invalid: {e}"))),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(RagError::ConfigError(format!("{key}={v:?} is not a boolean"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RagConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.embedding_dimensions, 384);
        assert_eq!(config.stats_sample_limit, 100);
    }

    #[test]
    fn builder_rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(50).chunk_overlap(50).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn builder_rejects_zero_top_k() {
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DOCQA_CHUNK_SIZE", "200"),
            ("DOCQA_CHUNK_OVERLAP", "20"),
            ("DOCQA_TOP_K", "7"),
            ("OPENROUTER_API_KEY", "sk-test"),
            ("OPENROUTER_BASE_URL", "http://localhost:9999/v1/"),
            ("DOCQA_REMOTE_EMBEDDINGS", "yes"),
            ("DOCQA_DOCS_DIR", "/srv/pdfs"),
            ("DOCQA_EMBEDDING_DIMENSIONS", "1536"),
            ("DOCQA_EMBEDDING_MODEL", "openai/text-embedding-ada-002"),
            ("DOCQA_MODEL_DIR", "/opt/models/minilm"),
        ]))
        .unwrap();

        assert_eq!(config.rag.chunk_size, 200);
        assert_eq!(config.rag.chunk_overlap, 20);
        assert_eq!(config.rag.top_k, 7);
        assert!(config.providers.is_configured());
        assert_eq!(config.providers.base_url, "http://localhost:9999/v1");
        assert!(config.providers.use_remote_embeddings);
        assert_eq!(config.docs_dir, PathBuf::from("/srv/pdfs"));
        assert_eq!(config.rag.embedding_dimensions, 1536);
        assert_eq!(config.providers.embedding_model, "openai/text-embedding-ada-002");
        assert_eq!(config.model_dir, PathBuf::from("/opt/models/minilm"));
        assert_eq!(config.local_model, "all-MiniLM-L6-v2");
    }

    #[test]
    fn zero_embedding_dimensions_are_rejected() {
        let err =
            AppConfig::from_lookup(lookup(&[("DOCQA_EMBEDDING_DIMENSIONS", "0")])).unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("DOCQA_TOP_K", "  "), ("OPENROUTER_API_KEY", "")]))
                .unwrap();
        assert_eq!(config.rag.top_k, 5);
        assert!(!config.providers.is_configured());
    }

    #[test]
    fn malformed_number_is_a_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("DOCQA_CHUNK_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("DOCQA_CHUNK_SIZE"));
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let providers =
            ProviderConfig { api_key: Some("sk-secret".to_string()), ..Default::default() };
        let rendered = format!("{providers:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
