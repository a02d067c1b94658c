//! OpenRouter (OpenAI-compatible) embedding and chat-completion providers.
//!
//! This module is only available when the `openrouter` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::CompletionProvider;
use crate::config::ProviderConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "OpenRouter";

fn build_client(config: &ProviderConfig) -> Result<(reqwest::Client, String)> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| RagError::ConfigError("remote provider requires an API key".into()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;

    Ok((client, api_key.to_string()))
}

async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// request/response types

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// embeddings

/// An [`EmbeddingProvider`] calling `{base_url}/embeddings` once per text.
///
/// Each request asks for `dimensions`-long vectors, which models with
/// shortenable embeddings (such as `text-embedding-3-small`) honour. Any
/// non-2xx status, transport failure, malformed body, or vector whose
/// length differs from [`dimensions`](EmbeddingProvider::dimensions) is an
/// [`RagError::EmbeddingError`], which lets a
/// [`FallbackEmbeddingProvider`](crate::FallbackEmbeddingProvider) re-embed
/// the batch locally.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openrouter::OpenRouterEmbeddingProvider;
///
/// let provider = OpenRouterEmbeddingProvider::new(&config.providers, 384)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OpenRouterEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    dimensions: usize,
}

impl OpenRouterEmbeddingProvider {
    /// Create a provider from `config`, expecting `dimensions`-long vectors.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no API key is configured.
    pub fn new(config: &ProviderConfig, dimensions: usize) -> Result<Self> {
        let (client, api_key) = build_client(config)?;
        Ok(Self {
            client,
            api_key,
            url: format!("{}/embeddings", config.base_url),
            model: config.embedding_model.clone(),
            dimensions,
        })
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenRouterEmbeddingProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), model = %self.model, "embedding text");

        let request =
            EmbeddingRequest { model: &self.model, input: text, dimensions: self.dimensions };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "embedding request failed");
                Self::err(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "embedding API error");
            return Err(Self::err(message));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Self::err(format!("failed to parse response: {e}")))?;

        let embedding = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Self::err("API returned no embedding"))?;

        if embedding.len() != self.dimensions {
            return Err(Self::err(format!(
                "API returned {} dimensions, expected {}",
                embedding.len(),
                self.dimensions
            )));
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// chat completions

/// A [`CompletionProvider`] calling `{base_url}/chat/completions`.
pub struct OpenRouterCompletionProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenRouterCompletionProvider {
    /// Create a provider from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no API key is configured.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let (client, api_key) = build_client(config)?;
        Ok(Self {
            client,
            api_key,
            url: format!("{}/chat/completions", config.base_url),
            model: config.completion_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::CompletionError { provider: PROVIDER.into(), message: message.into() }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterCompletionProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = user.len(),
            "requesting completion"
        );

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::err(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::err(error_detail(response).await));
        }

        let body: ChatResponse =
            response.json().await.map_err(|e| Self::err(format!("failed to parse response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Self::err("API returned no message content"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::config::RagConfig;
    use crate::document::Chunk;
    use crate::index::{EmbeddingMode, VectorIndex};
    use crate::inmemory::InMemoryVectorStore;
    use crate::local::HashingEmbeddingProvider;
    use crate::vectorstore::VectorStore;

    fn unreachable_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("test-key".into()),
            // Port 9 (discard) is closed on loopback, so connects are refused.
            base_url: "http://127.0.0.1:9/api/v1".into(),
            request_timeout_secs: 5,
            ..ProviderConfig::default()
        }
    }

    fn config_for(base_url: String) -> ProviderConfig {
        ProviderConfig { base_url, ..unreachable_config() }
    }

    async fn read_body(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).into_owned();
            let Some(end) = text.find("\r\n\r\n") else { continue };
            let length = text[..end]
                .lines()
                .find_map(|line| {
                    let line = line.to_ascii_lowercase();
                    line.strip_prefix("content-length:").and_then(|v| v.trim().parse().ok())
                })
                .unwrap_or(0usize);
            if buf.len() >= end + 4 + length {
                return String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).into_owned();
            }
        }
    }

    /// Answer every request with `body` and record the request bodies.
    async fn json_server(body: String) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let request = read_body(&mut socket).await;
                recorded.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/api/v1"), requests)
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_file: "fire_safety.pdf".into(),
            document_title: "Fire Safety".into(),
            page_number: 1,
            document_link: "file:///docs/fire_safety.pdf".into(),
            chunk_index: 0,
            word_count: text.split_whitespace().count(),
        }
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let err = OpenRouterCompletionProvider::new(&ProviderConfig::default()).err();
        assert!(matches!(err, Some(RagError::ConfigError(_))));
        assert!(OpenRouterEmbeddingProvider::new(&ProviderConfig::default(), 384).is_err());
    }

    #[tokio::test]
    async fn transport_failure_is_an_embedding_error() {
        let provider = OpenRouterEmbeddingProvider::new(&unreachable_config(), 384).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_a_completion_error() {
        let provider = OpenRouterCompletionProvider::new(&unreachable_config()).unwrap();
        let err = provider.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, RagError::CompletionError { .. }));
    }

    #[tokio::test]
    async fn embedding_request_asks_for_the_collection_dimensions() {
        let (base_url, requests) =
            json_server(r#"{"data":[{"embedding":[0.5,0.5,0.5,0.5]}]}"#.to_string()).await;
        let provider = OpenRouterEmbeddingProvider::new(&config_for(base_url), 4).unwrap();

        assert_eq!(provider.embed("fire alarm").await.unwrap(), vec![0.5; 4]);

        let sent: serde_json::Value =
            serde_json::from_str(&requests.lock().unwrap()[0]).unwrap();
        assert_eq!(sent["dimensions"], 4);
        assert_eq!(sent["model"], "openai/text-embedding-3-small");
        assert_eq!(sent["input"], "fire alarm");
    }

    #[tokio::test]
    async fn wrong_length_vector_is_an_embedding_error() {
        let (base_url, _) = json_server(r#"{"data":[{"embedding":[1.0,0.0]}]}"#.to_string()).await;
        let provider = OpenRouterEmbeddingProvider::new(&config_for(base_url), 4).unwrap();
        let err = provider.embed("fire alarm").await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingError { .. }));
    }

    #[tokio::test]
    async fn remote_vectors_are_stored_when_the_provider_succeeds() {
        let (base_url, requests) =
            json_server(r#"{"data":[{"embedding":[0.5,0.5,0.5,0.5]}]}"#.to_string()).await;
        let remote = OpenRouterEmbeddingProvider::new(&config_for(base_url), 4).unwrap();

        let store = Arc::new(InMemoryVectorStore::new());
        let config = RagConfig::builder().embedding_dimensions(4).build().unwrap();
        let local = Arc::new(HashingEmbeddingProvider::new(4));
        let index = VectorIndex::new(store.clone(), &config, local).with_remote(Arc::new(remote));

        let chunks = [chunk("pull the alarm"), chunk("use the stairs")];
        assert_eq!(index.add(&chunks, EmbeddingMode::PreferRemote).await.unwrap(), 2);
        assert_eq!(requests.lock().unwrap().len(), 2);

        // Both records carry the remote vector, so both sit at distance zero from it.
        let scored = store.search(index.collection(), &[0.5; 4], 2).await.unwrap();
        assert_eq!(scored.len(), 2);
        assert!(scored.iter().all(|s| s.distance.abs() < 1e-6));
    }
}
